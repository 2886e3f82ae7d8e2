//! MissingValuesSummary operation

use serde::Serialize;

use sift_core::Dataset;

use super::is_missing;

/// Per-column missingness
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMissing {
    pub name: String,
    pub null_count: usize,
    pub non_null_count: usize,
    pub null_percent: f64,
}

/// Counts of rows exceeding fixed missing-field thresholds
#[derive(Debug, Clone, Serialize)]
pub struct RowMissingThresholds {
    pub gt_1: usize,
    pub gt_2: usize,
    pub gt_3: usize,
}

/// Columns at or above fixed percent-missing thresholds
#[derive(Debug, Clone, Serialize)]
pub struct ColumnMissingThresholds {
    pub gte_20: Vec<String>,
    pub gte_50: Vec<String>,
    pub gte_80: Vec<String>,
}

/// MissingValuesSummary result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingValuesSummary {
    pub dataset_id: String,
    pub row_count: usize,
    pub rows_with_any_missing: usize,
    pub columns: Vec<ColumnMissing>,
    pub rows_with_more_than_missing: RowMissingThresholds,
    pub columns_over_missing_thresholds: ColumnMissingThresholds,
}

/// Summarize missingness per column and per row.
///
/// Missing means an absent field, an explicit null, or an empty string.
/// The threshold sets (more than 1/2/3 missing fields per row; at least
/// 20/50/80 percent missing per column) are fixed, not configurable.
pub fn missing_values_summary(dataset: &Dataset) -> MissingValuesSummary {
    let row_count = dataset.rows.len();
    let denominator = row_count.max(1) as f64;

    let columns: Vec<ColumnMissing> = dataset
        .columns
        .iter()
        .map(|col| {
            let null_count = dataset
                .rows
                .iter()
                .filter(|row| is_missing(row.get(&col.name)))
                .count();
            ColumnMissing {
                name: col.name.clone(),
                null_count,
                non_null_count: row_count - null_count,
                null_percent: null_count as f64 / denominator * 100.0,
            }
        })
        .collect();

    let missing_per_row: Vec<usize> = dataset
        .rows
        .iter()
        .map(|row| {
            dataset
                .columns
                .iter()
                .filter(|col| is_missing(row.get(&col.name)))
                .count()
        })
        .collect();

    let rows_with_any_missing = missing_per_row.iter().filter(|&&m| m > 0).count();
    let rows_with_more_than = |threshold: usize| {
        missing_per_row.iter().filter(|&&m| m > threshold).count()
    };
    let columns_at_least = |percent: f64| {
        columns
            .iter()
            .filter(|c| c.null_percent >= percent)
            .map(|c| c.name.clone())
            .collect::<Vec<_>>()
    };

    let columns_over_missing_thresholds = ColumnMissingThresholds {
        gte_20: columns_at_least(20.0),
        gte_50: columns_at_least(50.0),
        gte_80: columns_at_least(80.0),
    };

    MissingValuesSummary {
        dataset_id: dataset.id.clone(),
        row_count,
        rows_with_any_missing,
        columns,
        rows_with_more_than_missing: RowMissingThresholds {
            gt_1: rows_with_more_than(1),
            gt_2: rows_with_more_than(2),
            gt_3: rows_with_more_than(3),
        },
        columns_over_missing_thresholds,
    }
}
