//! # FDS Common Library
//!
//! Shared code for the vote aggregation tools:
//! - Error types
//! - TOML configuration model and file resolution
//! - Logging configuration

pub mod config;
pub mod error;

pub use error::{Error, Result};
