//! Result output: predictions CSV, console table and JSON run report

use crate::error::{AggregateError, Result};
use crate::estimator::{Aggregation, Algorithm, IterationRecord};
use crate::loader::IdMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One predicted label with the caller's identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub question: String,
    pub annotation: String,
}

/// Map index-based results back to raw question and label identifiers
pub fn predictions(
    aggregation: &Aggregation<usize, usize, usize>,
    questions: &IdMap,
    labels: &IdMap,
) -> Result<Vec<Prediction>> {
    aggregation
        .items
        .iter()
        .zip(&aggregation.labels)
        .map(|(&question, &label)| {
            let question = questions.value(question).ok_or_else(|| {
                AggregateError::InvalidInput(format!("Unknown question index {}", question))
            })?;
            let annotation = labels.value(label).ok_or_else(|| {
                AggregateError::InvalidInput(format!("Unknown label index {}", label))
            })?;
            Ok(Prediction {
                question: question.to_string(),
                annotation: annotation.to_string(),
            })
        })
        .collect()
}

/// Write predictions as headerless `question,annotation` rows
///
/// The output directory must already exist.
pub fn write_predictions_csv(path: &Path, predictions: &[Prediction]) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            return Err(AggregateError::InvalidInput(format!(
                "{} does not exist",
                dir.display()
            )));
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for prediction in predictions {
        writer.write_record([&prediction.question, &prediction.annotation])?;
    }
    writer.flush()?;
    Ok(())
}

/// Fixed-width table for console output
pub fn format_predictions_table(predictions: &[Prediction]) -> String {
    let width = predictions
        .iter()
        .map(|p| p.question.len())
        .chain(std::iter::once("Question".len()))
        .max()
        .unwrap_or(0);

    let mut table = format!("{:<width$}  Annotation\n", "Question", width = width);
    for prediction in predictions {
        table.push_str(&format!(
            "{:<width$}  {}\n",
            prediction.question,
            prediction.annotation,
            width = width
        ));
    }
    table
}

/// Summary of a run, serialized to JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub algorithm: Algorithm,
    pub seed: u64,
    pub questions: usize,
    pub annotators: usize,
    pub iterations: usize,
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Prior per class label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_marginals: Option<BTreeMap<String, f64>>,
    /// Confusion matrix per annotator, rows are true classes in `classes` order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confusion_matrices: Option<BTreeMap<String, Vec<Vec<f64>>>>,
    pub classes: Vec<String>,
    pub history: Vec<IterationRecord>,
}

impl RunReport {
    pub fn new(
        aggregation: &Aggregation<usize, usize, usize>,
        annotators: &IdMap,
        labels: &IdMap,
        seed: u64,
        accuracy: Option<f64>,
    ) -> Self {
        let label_name = |idx: usize| labels.value(idx).unwrap_or_default().to_string();
        let classes: Vec<String> = aggregation.classes.iter().map(|&c| label_name(c)).collect();

        let class_marginals = aggregation.class_marginals.as_ref().map(|marginals| {
            classes
                .iter()
                .cloned()
                .zip(marginals.iter().copied())
                .collect()
        });

        let confusion_matrices = aggregation.error_rates.as_ref().map(|rates| {
            aggregation
                .annotators
                .iter()
                .enumerate()
                .map(|(k, &annotator)| {
                    (
                        annotators.value(annotator).unwrap_or_default().to_string(),
                        rates.matrix(k),
                    )
                })
                .collect()
        });

        Self {
            algorithm: aggregation.algorithm,
            seed,
            questions: aggregation.items.len(),
            annotators: aggregation.annotators.len(),
            iterations: aggregation.iterations,
            converged: aggregation.converged,
            accuracy,
            class_marginals,
            confusion_matrices,
            classes,
            history: aggregation.history.clone(),
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
