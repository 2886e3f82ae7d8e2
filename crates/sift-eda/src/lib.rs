//! # Sift EDA
//!
//! The in-memory dataset statistics engine.
//!
//! Every operation is a pure function over an immutable [`Dataset`]
//! snapshot: same dataset, same parameters, same result. The `tools`
//! module wraps each operation as a model-facing [`Tool`] with the uniform
//! error contract: unknown dataset ids, unknown columns, and malformed
//! parameters come back as `{"error": "..."}` values, never as faults.
//!
//! [`Dataset`]: sift_core::Dataset
//! [`Tool`]: sift_core::Tool

pub mod charts;
mod error;
pub mod ops;
pub mod stats;
pub mod tools;

pub use charts::{Chart, ChartSpec, ChartType};
pub use error::EdaError;
pub use tools::install_statistics_tools;
