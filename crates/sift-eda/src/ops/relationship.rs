//! RelationshipDrilldown and CorrelationMatrix operations

use serde::Serialize;
use serde_json::{Map, Value};

use sift_core::Dataset;

use crate::stats;
use crate::EdaError;

use super::{numeric_values, require_column};

/// One sampled (x, y) pair
#[derive(Debug, Clone, Serialize)]
pub struct PairPoint {
    pub x: Value,
    pub y: Value,
}

/// RelationshipDrilldown result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDrilldown {
    pub dataset_id: String,
    pub x_column: String,
    pub y_column: String,
    pub sampled_count: usize,
    pub total_pairs: usize,
    pub points: Vec<PairPoint>,
}

/// Collect paired non-null (x, y) values preserving row order. When the
/// pair count exceeds `max_points`, sample every `ceil(total / max_points)`-th
/// pair. Unlike random sampling this is deterministic for a given dataset.
pub fn relationship_drilldown(
    dataset: &Dataset,
    x_column: &str,
    y_column: &str,
    max_points: usize,
) -> Result<RelationshipDrilldown, EdaError> {
    require_column(dataset, x_column)?;
    require_column(dataset, y_column)?;

    let pairs: Vec<PairPoint> = dataset
        .rows
        .iter()
        .filter_map(|row| {
            let x = row.get(x_column)?;
            let y = row.get(y_column)?;
            if x.is_null() || y.is_null() {
                return None;
            }
            Some(PairPoint {
                x: x.clone(),
                y: y.clone(),
            })
        })
        .collect();

    let total_pairs = pairs.len();
    let points: Vec<PairPoint> = if total_pairs > max_points {
        let stride = total_pairs.div_ceil(max_points);
        pairs
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| idx % stride == 0)
            .map(|(_, p)| p)
            .collect()
    } else {
        pairs
    };

    Ok(RelationshipDrilldown {
        dataset_id: dataset.id.clone(),
        x_column: x_column.to_string(),
        y_column: y_column.to_string(),
        sampled_count: points.len(),
        total_pairs,
        points,
    })
}

/// CorrelationMatrix result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    pub dataset_id: String,
    pub numeric_columns: Vec<String>,
    /// Nested `column -> column -> coefficient`, both levels in dataset
    /// column order.
    pub matrix: Map<String, Value>,
}

impl CorrelationMatrix {
    /// Coefficient for a column pair, if both are numeric columns
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.matrix.get(a)?.get(b)?.as_f64()
    }
}

/// Full symmetric Pearson correlation matrix over the numeric columns.
///
/// Each column's vector is its non-null numeric values in row order;
/// vectors are paired positionally over the shorter length. A zero-variance
/// vector yields coefficient 0 (finite by contract), so the diagonal is 1
/// only for columns with nonzero variance.
pub fn correlation_matrix(dataset: &Dataset) -> CorrelationMatrix {
    let numeric_columns: Vec<String> = dataset
        .numeric_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let vectors: Vec<Vec<f64>> = numeric_columns
        .iter()
        .map(|name| numeric_values(dataset, name))
        .collect();

    let mut matrix = Map::new();
    for (i, col_a) in numeric_columns.iter().enumerate() {
        let mut row = Map::new();
        for (j, col_b) in numeric_columns.iter().enumerate() {
            row.insert(col_b.clone(), stats::pearson(&vectors[i], &vectors[j]).into());
        }
        matrix.insert(col_a.clone(), Value::Object(row));
    }

    CorrelationMatrix {
        dataset_id: dataset.id.clone(),
        numeric_columns,
        matrix,
    }
}
