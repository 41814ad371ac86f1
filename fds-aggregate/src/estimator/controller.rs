//! EM control loop
//!
//! Runs M-step → E-step → likelihood each iteration, tracks the change in
//! class marginals and error rates, stops on the convergence tolerance or the
//! iteration cap, and moves the hybrid algorithm into its hard phase.

use super::counts::CountTensor;
use super::e_step::e_step;
use super::init::initialize;
use super::likelihood::log_likelihood;
use super::m_step::m_step;
use super::model::{marginal_delta, ErrorRates, LabelDistribution};
use super::params::{EstimatorParams, Phase};
use crate::error::Result;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Diagnostics for one EM iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Phase the iteration ran in
    pub phase: Phase,
    pub log_likelihood: f64,
    /// `Σ|Δp|` against the previous iteration (absent on the first)
    pub marginal_delta: Option<f64>,
    /// `Σ|Δπ|` against the previous iteration (absent on the first)
    pub error_rate_delta: Option<f64>,
}

/// Outcome of the control loop
#[derive(Debug, Clone)]
pub struct Fit {
    /// Last label distribution (the initial one for majority vote)
    pub distribution: LabelDistribution,
    /// Final parameters, `None` for majority vote
    pub class_marginals: Option<Vec<f64>>,
    pub error_rates: Option<ErrorRates>,
    pub history: Vec<IterationRecord>,
    pub iterations: usize,
    /// False when the iteration cap stopped the loop
    pub converged: bool,
}

/// Orchestrates the EM iterations for one parameter set
pub struct ConvergenceController {
    params: EstimatorParams,
}

impl ConvergenceController {
    pub fn new(params: EstimatorParams) -> Self {
        Self { params }
    }

    /// Initialize and iterate until convergence or the iteration cap
    pub fn run<R: Rng + ?Sized>(&self, counts: &CountTensor, rng: &mut R) -> Result<Fit> {
        let params = &self.params;
        let mut distribution = initialize(counts, params.algorithm, params.tie_break, rng);

        let Some(mut phase) = params.algorithm.initial_phase() else {
            debug!("Majority vote: no EM iterations");
            return Ok(Fit {
                distribution,
                class_marginals: None,
                error_rates: None,
                history: Vec::new(),
                iterations: 0,
                converged: true,
            });
        };

        let mut history = Vec::new();
        let mut previous: Option<(Vec<f64>, ErrorRates)> = None;
        let mut iteration = 0;

        let (class_marginals, error_rates, converged) = loop {
            iteration += 1;
            let iteration_phase = phase;

            let (class_marginals, error_rates) = m_step(counts, &distribution);
            distribution = e_step(
                counts,
                &class_marginals,
                &error_rates,
                phase,
                params.tie_break,
                rng,
            );
            let log_l = log_likelihood(counts, &class_marginals, &error_rates, iteration)?;

            let deltas = previous.as_ref().map(|(old_marginals, old_rates)| {
                (
                    marginal_delta(&class_marginals, old_marginals),
                    error_rates.total_abs_diff(old_rates),
                )
            });

            debug!(
                iteration,
                phase = %iteration_phase,
                log_likelihood = log_l,
                marginal_delta = deltas.map(|d| d.0),
                error_rate_delta = deltas.map(|d| d.1),
                "EM iteration"
            );

            history.push(IterationRecord {
                iteration,
                phase: iteration_phase,
                log_likelihood: log_l,
                marginal_delta: deltas.map(|d| d.0),
                error_rate_delta: deltas.map(|d| d.1),
            });

            if let Some((cm_delta, _)) = deltas {
                if cm_delta < params.tolerance {
                    break (class_marginals, error_rates, true);
                }
            }
            if iteration >= params.max_iterations {
                break (class_marginals, error_rates, false);
            }
            if let Some((cm_delta, _)) = deltas {
                let next = phase.next(cm_delta, params.switch_tolerance);
                if next != phase {
                    info!(iteration, from = %phase, to = %next, "Switching EM phase");
                    phase = next;
                }
            }

            previous = Some((class_marginals, error_rates));
        };

        if converged {
            info!(iterations = iteration, algorithm = %params.algorithm, "EM converged");
        } else {
            info!(
                iterations = iteration,
                algorithm = %params.algorithm,
                "EM stopped at iteration cap before converging"
            );
        }
        debug!(?class_marginals, "Final class marginals");

        Ok(Fit {
            distribution,
            class_marginals: Some(class_marginals),
            error_rates: Some(error_rates),
            history,
            iterations: iteration,
            converged,
        })
    }
}
