//! Statistics engine error types

use thiserror::Error;

/// Reportable engine failures.
///
/// These are returned to the model as `{"error": message}` tool results and
/// never abort a run; the messages are written for the model to relay in
/// natural language.
#[derive(Debug, Error)]
pub enum EdaError {
    #[error("Dataset with id '{0}' was not found on the server. Make sure the user has uploaded a dataset first.")]
    DatasetNotFound(String),

    #[error("Column '{0}' was not found in the dataset.")]
    ColumnNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
