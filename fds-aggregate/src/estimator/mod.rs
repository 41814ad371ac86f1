//! Dawid-Skene vote aggregation
//!
//! Estimates a consensus label per item together with a confusion matrix per
//! annotator, using EM on the Dawid & Skene (1979) model.
//!
//! # Algorithms
//! - `MV`: majority vote, no iterations
//! - `DS`: soft EM
//! - `FDS`: hard EM (E-step + C-step), much faster to converge
//! - `H`: soft EM until the class marginals settle, then hard EM
//!
//! # Pipeline
//! responses → [`build_counts`] → [`initialize`] → {[`m_step`] ⇄ [`e_step`]}
//! driven by [`ConvergenceController`] → arg-max labels
//!
//! The only randomness is the tie-break among equally likely classes, drawn
//! from the caller's `Rng` so runs are reproducible with a seeded generator.

pub mod controller;
pub mod counts;
pub mod e_step;
pub mod init;
pub mod likelihood;
pub mod m_step;
pub mod model;
pub mod params;

pub use controller::{ConvergenceController, Fit, IterationRecord};
pub use counts::{build_counts, CountTensor, IndexedCounts, ResponseSet};
pub use e_step::e_step;
pub use init::initialize;
pub use likelihood::log_likelihood;
pub use m_step::m_step;
pub use model::{ErrorRates, LabelDistribution};
pub use params::{Algorithm, EstimatorParams, Phase, TieBreak};

use crate::error::{AggregateError, Result};
use rand::Rng;
use tracing::info;

/// Result of aggregating one response set
#[derive(Debug, Clone)]
pub struct Aggregation<I, A, L> {
    pub algorithm: Algorithm,
    /// Items in canonical (sorted) order
    pub items: Vec<I>,
    pub annotators: Vec<A>,
    pub classes: Vec<L>,
    /// Consensus label per item, aligned with `items`
    pub labels: Vec<L>,
    /// Final class marginals (`None` for majority vote)
    pub class_marginals: Option<Vec<f64>>,
    /// Final confusion matrices (`None` for majority vote)
    pub error_rates: Option<ErrorRates>,
    pub history: Vec<IterationRecord>,
    pub iterations: usize,
    pub converged: bool,
}

/// Aggregate crowd responses into one label per item
///
/// # Errors
/// - `InvalidInput` for bad parameters or a response set without observations
/// - `NumericalInstability` if the log-likelihood stops being finite
pub fn aggregate<I, A, L, R>(
    responses: &ResponseSet<I, A, L>,
    params: &EstimatorParams,
    rng: &mut R,
) -> Result<Aggregation<I, A, L>>
where
    I: Ord + Clone,
    A: Ord + Clone,
    L: Ord + Clone,
    R: Rng + ?Sized,
{
    params.validate()?;

    if responses.is_empty() {
        return Err(AggregateError::InvalidInput(
            "Response set contains no items".to_string(),
        ));
    }

    let indexed = build_counts(responses);
    if indexed.annotators.is_empty() || indexed.counts.total() == 0 {
        return Err(AggregateError::InvalidInput(
            "Response set contains no annotator labels".to_string(),
        ));
    }

    info!(
        questions = indexed.items.len(),
        participants = indexed.annotators.len(),
        classes = indexed.classes.len(),
        algorithm = %params.algorithm,
        "Aggregating responses"
    );

    let fit = ConvergenceController::new(*params).run(&indexed.counts, rng)?;
    let labels = fit
        .distribution
        .hard_labels(params.tie_break, rng)
        .into_iter()
        .map(|class| indexed.classes[class].clone())
        .collect();

    Ok(Aggregation {
        algorithm: params.algorithm,
        items: indexed.items,
        annotators: indexed.annotators,
        classes: indexed.classes,
        labels,
        class_marginals: fit.class_marginals,
        error_rates: fit.error_rates,
        history: fit.history,
        iterations: fit.iterations,
        converged: fit.converged,
    })
}

/// Fraction of positions where `predicted` matches `gold`
///
/// `None` when the slices are empty or differ in length.
pub fn accuracy<L: PartialEq>(predicted: &[L], gold: &[L]) -> Option<f64> {
    if predicted.is_empty() || predicted.len() != gold.len() {
        return None;
    }
    let hits = predicted.iter().zip(gold).filter(|(p, g)| p == g).count();
    Some(hits as f64 / predicted.len() as f64)
}
