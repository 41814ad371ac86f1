//! Error types for fds-aggregate
//!
//! Caller contract violations surface as `InvalidInput` before the estimator
//! runs. `NumericalInstability` is the only failure raised from inside the
//! EM loop.

use thiserror::Error;

/// Main error type for fds-aggregate
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Invalid responses, parameters or names, rejected at the boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Log-likelihood became NaN or infinite
    ///
    /// `item` is the canonical index of the offending item.
    #[error(
        "Numerical instability at iteration {iteration}: item {item} has likelihood \
         {item_likelihood:e} (log-likelihood so far {log_likelihood})"
    )]
    NumericalInstability {
        item: usize,
        iteration: usize,
        log_likelihood: f64,
        item_likelihood: f64,
    },

    /// Annotation or ground-truth files are inconsistent or unusable
    #[error("Load error: {0}")]
    Load(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON report serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// fds-common error
    #[error("Common error: {0}")]
    Common(#[from] fds_common::Error),
}

/// Convenience Result type using AggregateError
pub type Result<T> = std::result::Result<T, AggregateError>;
