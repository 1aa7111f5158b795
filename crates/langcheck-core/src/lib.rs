//! LangCheck Core
//!
//! Core types and error handling shared across LangCheck crates.
//!
//! This crate provides:
//! - The `Error` type and `Result` alias
//! - `Language` and `Metric` identifiers used to key model configuration
//! - `MetricValue`, the per-instance result of every metric

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Language, Metric, MetricValue};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{Language, Metric, MetricValue};
}
