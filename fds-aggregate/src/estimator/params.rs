//! Algorithm selection, EM phases and tuning parameters

use crate::error::{AggregateError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Aggregation algorithm requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Algorithm {
    /// Plain majority vote, no EM iterations
    #[serde(rename = "MV")]
    MajorityVote,
    /// Classic soft EM (Dawid & Skene 1979)
    #[serde(rename = "DS")]
    DawidSkene,
    /// Hard EM: E-step followed by a C-step every iteration
    #[serde(rename = "FDS")]
    FastDawidSkene,
    /// Soft EM until the class marginals settle, then hard EM
    #[serde(rename = "H")]
    Hybrid,
}

impl Algorithm {
    /// Short name used on the command line and in reports
    pub fn short_name(&self) -> &'static str {
        match self {
            Algorithm::MajorityVote => "MV",
            Algorithm::DawidSkene => "DS",
            Algorithm::FastDawidSkene => "FDS",
            Algorithm::Hybrid => "H",
        }
    }

    /// Whether the initial label distribution is a majority-vote one-hot
    /// (as opposed to normalized vote frequencies)
    pub fn initializes_with_majority_vote(&self) -> bool {
        matches!(self, Algorithm::MajorityVote | Algorithm::FastDawidSkene)
    }

    /// First EM phase, or `None` when the algorithm does not iterate
    pub fn initial_phase(&self) -> Option<Phase> {
        match self {
            Algorithm::MajorityVote => None,
            Algorithm::DawidSkene => Some(Phase::DawidSkene),
            Algorithm::FastDawidSkene => Some(Phase::FastDawidSkene),
            Algorithm::Hybrid => Some(Phase::HybridSoft),
        }
    }
}

impl FromStr for Algorithm {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mv" | "majority-vote" | "majority_vote" | "majorityvote" => {
                Ok(Algorithm::MajorityVote)
            }
            "ds" | "dawid-skene" | "dawid_skene" | "dawidskene" => Ok(Algorithm::DawidSkene),
            "fds" | "fast-dawid-skene" | "fast_dawid_skene" | "fastdawidskene" => {
                Ok(Algorithm::FastDawidSkene)
            }
            "h" | "hybrid" => Ok(Algorithm::Hybrid),
            other => Err(AggregateError::InvalidInput(format!(
                "Unknown algorithm '{}', expected one of MV, DS, FDS, H",
                other
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Internal EM phase
///
/// `HybridSoft` moves to `HybridHard` once the class marginal delta drops to
/// the switch tolerance. No other phase ever changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[serde(rename = "DS")]
    DawidSkene,
    #[serde(rename = "FDS")]
    FastDawidSkene,
    #[serde(rename = "H")]
    HybridSoft,
    #[serde(rename = "Hphase2")]
    HybridHard,
}

impl Phase {
    /// Whether the E-step is followed by the C-step (arg-max collapse)
    pub fn is_hard(&self) -> bool {
        matches!(self, Phase::FastDawidSkene | Phase::HybridHard)
    }

    /// Phase for the next iteration given this iteration's marginal delta
    pub fn next(self, marginal_delta: f64, switch_tolerance: f64) -> Phase {
        match self {
            Phase::HybridSoft if marginal_delta <= switch_tolerance => Phase::HybridHard,
            other => other,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Phase::DawidSkene => "DS",
            Phase::FastDawidSkene => "FDS",
            Phase::HybridSoft => "H",
            Phase::HybridHard => "Hphase2",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// How to choose among classes sharing the maximal score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Uniformly at random from the injected random source
    #[default]
    Random,
    /// First maximal class in canonical order
    LowestIndex,
}

impl FromStr for TieBreak {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(TieBreak::Random),
            "lowest-index" | "lowest_index" | "lowest" => Ok(TieBreak::LowestIndex),
            other => Err(AggregateError::InvalidInput(format!(
                "Unknown tie-break policy '{}', expected 'random' or 'lowest-index'",
                other
            ))),
        }
    }
}

/// Estimator tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorParams {
    pub algorithm: Algorithm,
    /// Convergence threshold on the total absolute change in class marginals
    pub tolerance: f64,
    /// Hybrid mode switch threshold (looser than `tolerance`)
    pub switch_tolerance: f64,
    /// Hard cap on EM iterations
    pub max_iterations: usize,
    pub tie_break: TieBreak,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::FastDawidSkene,
            tolerance: 1e-4,
            switch_tolerance: 5e-3,
            max_iterations: 100,
            tie_break: TieBreak::Random,
        }
    }
}

impl EstimatorParams {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Reject parameters the estimator cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(AggregateError::InvalidInput(format!(
                "Convergence tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if !self.switch_tolerance.is_finite() || self.switch_tolerance < 0.0 {
            return Err(AggregateError::InvalidInput(format!(
                "Switch tolerance must be a non-negative number, got {}",
                self.switch_tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(AggregateError::InvalidInput(
                "Maximum iteration count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
