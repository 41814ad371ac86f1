//! fds-aggregate library interface
//!
//! Crowd vote aggregation with Dawid-Skene EM and its fast/hybrid variants,
//! plus the CSV loader and result writers used by the `fds-aggregate` binary.

pub mod error;
pub mod estimator;
pub mod loader;
pub mod output;

pub use crate::error::{AggregateError, Result};
pub use crate::estimator::{
    accuracy, aggregate, Aggregation, Algorithm, EstimatorParams, ResponseSet, TieBreak,
};
pub use crate::loader::{DataLoader, DatasetPaths, LoadMode};

/// Build identification captured by `build.rs`
pub fn build_info() -> String {
    format!(
        "{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    )
}
