//! Dataset module
//!
//! This module provides the in-memory tabular dataset model:
//! - Dataset: immutable rows plus inferred column metadata
//! - DatasetSummary: lightweight view without row data
//! - DatasetStore: process-lifetime, append-only store keyed by opaque id
//!
//! Rows are decoded into JSON scalar values by an external decoder before
//! they reach this crate; nothing here parses source file bytes.

mod store;

pub use store::DatasetStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// How many leading rows are sampled for column type inference.
const INFERENCE_SAMPLE_ROWS: usize = 20;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Inferred type of a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    String,
    Boolean,
    Unknown,
}

/// A named column with its inferred type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Lightweight dataset view: everything except the rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
    pub row_count: usize,
    pub columns: Vec<Column>,
}

/// An immutable, in-memory table of typed rows under an opaque id
///
/// Columns are inferred once at ingestion and never re-inferred, even if
/// later rows contradict the sampled type (known limitation, by contract).
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub row_count: usize,
    pub columns: Vec<Column>,
    pub rows: Vec<Map<String, Value>>,
}

impl Dataset {
    /// Create a dataset from decoded rows, inferring column types
    pub fn from_rows(
        id: impl Into<String>,
        name: impl Into<String>,
        rows: Vec<Map<String, Value>>,
    ) -> Self {
        let columns = infer_columns(&rows);
        Self {
            id: id.into(),
            name: name.into(),
            row_count: rows.len(),
            columns,
            rows,
        }
    }

    /// The lightweight summary view of this dataset
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            row_count: self.row_count,
            columns: self.columns.clone(),
        }
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with the given name exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names of all columns inferred as numeric, in dataset column order
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Number)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Infer column types from a sample of up to 20 rows.
///
/// Column names come from the first sampled row. Per column, over the
/// sampled non-null values:
/// - all numbers, or all strings that fully parse as finite numbers -> number
/// - all booleans -> boolean
/// - empty sample -> unknown
/// - anything else (plain strings, mixed scalars) -> string
fn infer_columns(rows: &[Map<String, Value>]) -> Vec<Column> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let sample = &rows[..rows.len().min(INFERENCE_SAMPLE_ROWS)];

    first
        .keys()
        .map(|name| {
            let values: Vec<&Value> = sample
                .iter()
                .filter_map(|row| row.get(name))
                .filter(|v| !v.is_null())
                .collect();

            let column_type = if values.is_empty() {
                ColumnType::Unknown
            } else if values.iter().all(|v| v.is_number()) {
                ColumnType::Number
            } else if values.iter().all(|v| v.is_boolean()) {
                ColumnType::Boolean
            } else if values.iter().all(|v| v.is_string()) {
                let all_numeric = values.iter().all(|v| {
                    v.as_str()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .is_some_and(f64::is_finite)
                });
                if all_numeric {
                    ColumnType::Number
                } else {
                    ColumnType::String
                }
            } else {
                ColumnType::String
            };

            Column {
                name: name.clone(),
                column_type,
            }
        })
        .collect()
}
