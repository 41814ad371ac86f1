//! Crowd annotation loader
//!
//! Reads a headerless `annotator,question,annotation` CSV and, in test mode, a
//! headerless `question,annotation` ground-truth CSV. Every column is mapped to
//! contiguous indices in order of first appearance; the loader keeps both
//! directions of each mapping so results can be reported with the original
//! identifiers.
//!
//! With `k > 0` only the first `k` annotations of each question (file order)
//! are kept.

use crate::error::{AggregateError, Result};
use crate::estimator::ResponseSet;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Whether ground truth is expected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Crowd annotations only
    Aggregate,
    /// Crowd annotations plus ground truth for accuracy reporting
    Test,
}

impl FromStr for LoadMode {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "aggregate" => Ok(LoadMode::Aggregate),
            "test" => Ok(LoadMode::Test),
            other => Err(AggregateError::InvalidInput(format!(
                "Invalid mode '{}', expected 'aggregate' or 'test'",
                other
            ))),
        }
    }
}

/// Bidirectional mapping between raw identifiers and contiguous indices
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

impl IdMap {
    /// Index of `value`, assigning the next free index on first sight
    pub fn intern(&mut self, value: &str) -> usize {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.values.len();
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn value(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One crowd annotation as indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation {
    pub annotator: usize,
    pub question: usize,
    pub label: usize,
}

/// Where to find a dataset's files
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub crowd: PathBuf,
    pub gold: PathBuf,
}

impl DatasetPaths {
    /// Default layout: `<root>/data/<dataset>_dataset/{crowd,gold}.csv`,
    /// with each piece individually overridable
    pub fn resolve(
        root: &Path,
        dataset: &str,
        data_dir: Option<&Path>,
        crowd: Option<&Path>,
        gold: Option<&Path>,
    ) -> Self {
        let data_dir = data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join("data").join(format!("{}_dataset", dataset)));

        Self {
            crowd: crowd
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.join("crowd.csv")),
            gold: gold
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.join("gold.csv")),
        }
    }
}

/// Loaded crowd data with optional ground truth
#[derive(Debug, Clone)]
pub struct DataLoader {
    k: usize,
    mode: LoadMode,
    annotators: IdMap,
    questions: IdMap,
    labels: IdMap,
    annotations: Vec<Annotation>,
    filtered: Vec<Annotation>,
    min_annotations: usize,
    gold: Option<Vec<usize>>,
}

impl DataLoader {
    /// Load the crowd file (and gold file in test mode)
    ///
    /// # Errors
    /// - a missing or malformed file
    /// - `k` larger than the smallest per-question annotation count
    /// - ground truth that does not line up with the crowd questions or labels
    pub fn load(paths: &DatasetPaths, k: usize, mode: LoadMode) -> Result<Self> {
        if !paths.crowd.exists() {
            return Err(AggregateError::Load(format!(
                "{} does not exist",
                paths.crowd.display()
            )));
        }

        let mut loader = Self::from_crowd_rows(read_rows(&paths.crowd, 3)?, k, mode)?;
        info!(
            path = %paths.crowd.display(),
            annotations = loader.annotations.len(),
            questions = loader.questions.len(),
            annotators = loader.annotators.len(),
            labels = loader.labels.len(),
            "Loaded crowd annotations"
        );

        if mode == LoadMode::Test {
            if !paths.gold.exists() {
                return Err(AggregateError::Load(format!(
                    "{} does not exist",
                    paths.gold.display()
                )));
            }
            loader.attach_gold(read_rows(&paths.gold, 2)?)?;
            info!(path = %paths.gold.display(), "Loaded ground truth");
        }

        Ok(loader)
    }

    /// Build from `[annotator, question, annotation]` rows in file order
    pub fn from_crowd_rows(rows: Vec<Vec<String>>, k: usize, mode: LoadMode) -> Result<Self> {
        let mut annotators = IdMap::default();
        let mut questions = IdMap::default();
        let mut labels = IdMap::default();

        let mut annotations = Vec::with_capacity(rows.len());
        for (line, row) in rows.iter().enumerate() {
            let [annotator, question, label] = row.as_slice() else {
                return Err(AggregateError::Load(format!(
                    "Crowd row {} has {} fields, expected 3",
                    line + 1,
                    row.len()
                )));
            };
            annotations.push(Annotation {
                annotator: annotators.intern(annotator),
                question: questions.intern(question),
                label: labels.intern(label),
            });
        }

        if annotations.is_empty() {
            return Err(AggregateError::Load("Crowd annotation file is empty".to_string()));
        }

        let mut per_question = vec![0usize; questions.len()];
        for annotation in &annotations {
            per_question[annotation.question] += 1;
        }
        let min_annotations = per_question.iter().copied().min().unwrap_or(0);

        let mut loader = Self {
            k: 0,
            mode,
            annotators,
            questions,
            labels,
            filtered: Vec::new(),
            annotations,
            min_annotations,
            gold: None,
        };
        loader.set_k(k)?;
        Ok(loader)
    }

    /// Change the per-question annotation limit (0 keeps everything)
    pub fn set_k(&mut self, k: usize) -> Result<()> {
        if k > self.min_annotations {
            return Err(AggregateError::InvalidInput(format!(
                "Some questions do not have {} annotators (minimum is {})",
                k, self.min_annotations
            )));
        }
        self.k = k;
        self.filter();
        Ok(())
    }

    fn filter(&mut self) {
        if self.k == 0 {
            self.filtered = self.annotations.clone();
            return;
        }

        let k = self.k;
        let mut seen = vec![0usize; self.questions.len()];
        self.filtered = self
            .annotations
            .iter()
            .filter(|annotation| {
                let count = &mut seen[annotation.question];
                *count += 1;
                *count <= k
            })
            .copied()
            .collect();
        debug!(k = self.k, kept = self.filtered.len(), "Filtered annotations");
    }

    fn attach_gold(&mut self, rows: Vec<Vec<String>>) -> Result<()> {
        let mut gold: Vec<Option<usize>> = vec![None; self.questions.len()];
        let mut distinct = 0;

        for row in &rows {
            let [question_id, label_id] = row.as_slice() else {
                return Err(AggregateError::Load(format!(
                    "Ground truth row has {} fields, expected 2",
                    row.len()
                )));
            };
            let question = self.questions.index_of(question_id).ok_or_else(|| {
                AggregateError::Load(format!(
                    "Mismatch in question IDs in annotations and ground truths: '{}'",
                    question_id
                ))
            })?;
            let label = self.labels.index_of(label_id).ok_or_else(|| {
                AggregateError::Load(format!(
                    "Ground truth label '{}' for question '{}' does not appear in the \
                     crowd annotations",
                    label_id, question_id
                ))
            })?;

            match gold[question] {
                None => {
                    gold[question] = Some(label);
                    distinct += 1;
                }
                Some(existing) if existing == label => {}
                Some(_) => {
                    return Err(AggregateError::Load(format!(
                        "Conflicting ground truth for question '{}'",
                        question_id
                    )))
                }
            }
        }

        if distinct != self.questions.len() {
            return Err(AggregateError::Load(format!(
                "Mismatch in number of questions in annotations ({}) and ground truths ({})",
                self.questions.len(),
                distinct
            )));
        }

        self.gold = Some(gold.into_iter().flatten().collect());
        Ok(())
    }

    /// Responses as `question -> annotator -> [labels]`, all as indices
    pub fn responses(&self) -> ResponseSet<usize, usize, usize> {
        let mut responses: ResponseSet<usize, usize, usize> = BTreeMap::new();
        for annotation in &self.filtered {
            responses
                .entry(annotation.question)
                .or_default()
                .entry(annotation.annotator)
                .or_default()
                .push(annotation.label);
        }
        responses
    }

    /// Ground-truth label index per question index (test mode only)
    pub fn gold(&self) -> Option<&[usize]> {
        self.gold.as_deref()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    pub fn questions(&self) -> &IdMap {
        &self.questions
    }

    pub fn annotators(&self) -> &IdMap {
        &self.annotators
    }

    pub fn labels(&self) -> &IdMap {
        &self.labels
    }

    /// All annotations in file order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations kept after first-k filtering
    pub fn filtered(&self) -> &[Annotation] {
        &self.filtered
    }

    /// Smallest number of annotations any question received
    pub fn min_annotations(&self) -> usize {
        self.min_annotations
    }
}

/// Read a headerless CSV with exactly `columns` trimmed fields per row
fn read_rows(path: &Path, columns: usize) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != columns {
            return Err(AggregateError::Load(format!(
                "{}: line {} has {} fields, expected {}",
                path.display(),
                line + 1,
                record.len(),
                columns
            )));
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
