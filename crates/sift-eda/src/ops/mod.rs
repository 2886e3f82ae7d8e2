//! Statistics engine operations
//!
//! One module per operation. Each operation is a pure, synchronous
//! function over `&Dataset` plus validated parameters, returning a typed
//! result struct (serialized camelCase on the wire) or an [`EdaError`].
//!
//! [`EdaError`]: crate::EdaError

mod grouped;
mod missing;
mod relationship;
mod report;
mod summarize;
mod target;
mod time_series;
mod value_counts;

pub use grouped::{grouped_summary, top_segments, GroupedSummary, Segment, SortDirection, TopSegments};
pub use missing::{missing_values_summary, ColumnMissing, MissingValuesSummary};
pub use relationship::{
    correlation_matrix, relationship_drilldown, CorrelationMatrix, PairPoint,
    RelationshipDrilldown,
};
pub use report::{generate_eda_report, EdaReport, ReportSection};
pub use summarize::{
    summarize_columns, CardinalityBucket, ColumnSummaries, ColumnSummary, NumericStats,
};
pub use target::{
    target_analysis, DistributionSummary, FeatureImportance, InferredProblemType, ProblemType,
    TargetAnalysis, TargetDistribution,
};
pub use time_series::{time_series_slice, Granularity, SeriesPoint, TimeSeries};
pub use value_counts::{value_counts, ValueCount, ValueCounts};

use serde_json::Value;

use sift_core::Dataset;

use crate::EdaError;

/// Fail with `ColumnNotFound` unless the dataset has the column.
pub(crate) fn require_column(dataset: &Dataset, name: &str) -> Result<(), EdaError> {
    if dataset.has_column(name) {
        Ok(())
    } else {
        Err(EdaError::ColumnNotFound(name.to_string()))
    }
}

/// Non-null values of a column, in row order.
pub(crate) fn non_null_values<'a>(dataset: &'a Dataset, column: &str) -> Vec<&'a Value> {
    dataset
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_null())
        .collect()
}

/// Numeric values of a column (JSON numbers only), in row order.
pub(crate) fn numeric_values(dataset: &Dataset, column: &str) -> Vec<f64> {
    dataset
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter_map(Value::as_f64)
        .collect()
}

/// Comparable key for distinct-value counting: numbers and booleans as-is,
/// everything else stringified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey {
    Number(u64),
    Bool(bool),
    Text(String),
}

pub(crate) fn value_key(value: &Value) -> ValueKey {
    match value {
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            // Fold -0.0 into 0.0 so the two count as one value.
            let f = if f == 0.0 { 0.0 } else { f };
            ValueKey::Number(f.to_bits())
        }
        Value::Bool(b) => ValueKey::Bool(*b),
        Value::String(s) => ValueKey::Text(s.clone()),
        other => ValueKey::Text(other.to_string()),
    }
}

/// Human-facing string form of a scalar value, as used for category keys.
/// Whole-number floats print without a trailing `.0`.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                format!("{}", n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Missing means an absent field, an explicit null, or an empty string.
pub(crate) fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Map, Value};
    use sift_core::Dataset;

    /// Build a dataset from `json!` row literals.
    pub(crate) fn dataset(name: &str, rows: Vec<Value>) -> Dataset {
        let rows: Vec<Map<String, Value>> = rows
            .into_iter()
            .map(|v| v.as_object().expect("row object").clone())
            .collect();
        Dataset::from_rows("ds-test", name, rows)
    }
}
