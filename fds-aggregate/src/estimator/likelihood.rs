//! Data log-likelihood under the current parameters
//!
//! `log L = Σ_i ln Σ_j score[i][j]`, using the E-step scores. Diagnostic
//! only; it never feeds back into the updates.

use super::counts::CountTensor;
use super::e_step::item_scores;
use super::model::ErrorRates;
use crate::error::{AggregateError, Result};

/// Log-likelihood of the counts, or `NumericalInstability` as soon as the
/// running total stops being finite
pub fn log_likelihood(
    counts: &CountTensor,
    marginals: &[f64],
    error_rates: &ErrorRates,
    iteration: usize,
) -> Result<f64> {
    let mut log_l = 0.0;
    let mut scores = vec![0.0; counts.classes()];

    for item in 0..counts.items() {
        item_scores(counts, marginals, error_rates, item, &mut scores);
        let item_likelihood: f64 = scores.iter().sum();
        let next = log_l + item_likelihood.ln();

        if !next.is_finite() {
            return Err(AggregateError::NumericalInstability {
                item,
                iteration,
                log_likelihood: log_l,
                item_likelihood,
            });
        }

        log_l = next;
    }

    Ok(log_l)
}
