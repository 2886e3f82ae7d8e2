//! SummarizeColumns operation

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use sift_core::{ColumnType, Dataset};

use crate::charts::{some_if_nonempty, Chart, ChartSpec};
use crate::stats;

use super::{non_null_values, value_key};

const SAMPLE_VALUE_LIMIT: usize = 5;

/// Coarse classification of a column's distinct-value count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityBucket {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl CardinalityBucket {
    fn for_distinct_count(count: usize) -> Self {
        if count <= 10 {
            Self::Low
        } else if count <= 100 {
            Self::Medium
        } else if count <= 1000 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

/// Distribution statistics over a column's non-null numeric values
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub outlier_count_iqr: usize,
    pub outlier_fraction_iqr: f64,
}

impl NumericStats {
    /// Compute the full numeric profile of a non-empty value slice.
    pub(crate) fn compute(nums: &[f64]) -> Self {
        let mut sorted = nums.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean = stats::mean(nums);
        let median = stats::quantile(&sorted, 0.5);
        let q1 = stats::quantile(&sorted, 0.25);
        let q3 = stats::quantile(&sorted, 0.75);
        let iqr = q3 - q1;

        let n = nums.len();
        let (m2, m3, m4) = stats::central_moment_sums(nums, mean);
        let variance = stats::sample_variance(n, m2);
        let std_dev = variance.sqrt();
        let skewness = stats::skewness(n, m3, std_dev);
        let kurtosis = stats::excess_kurtosis(n, m4, variance);

        let lower_fence = q1 - 1.5 * iqr;
        let upper_fence = q3 + 1.5 * iqr;
        let outlier_count_iqr = nums
            .iter()
            .filter(|&&x| x < lower_fence || x > upper_fence)
            .count();
        let outlier_fraction_iqr = outlier_count_iqr as f64 / n as f64;

        Self {
            min,
            max,
            mean,
            median,
            q1,
            q3,
            iqr,
            variance,
            std_dev,
            skewness,
            kurtosis,
            outlier_count_iqr,
            outlier_fraction_iqr,
        }
    }
}

/// Summary of a single column
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub non_null_count: usize,
    pub null_count: usize,
    pub distinct_count: usize,
    pub sample_values: Vec<Value>,
    pub cardinality_bucket: CardinalityBucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_stats: Option<NumericStats>,
}

/// SummarizeColumns result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummaries {
    pub dataset_id: String,
    pub row_count: usize,
    pub columns: Vec<ColumnSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<Chart>>,
}

/// Per-column counts, distincts, and numeric distribution statistics.
///
/// Numeric stats cover the column's non-null numeric values only; a
/// number-typed column with no actual numeric values (possible when the
/// inference sample saw numeric strings) omits the block. Each numeric
/// column also contributes a histogram chart.
pub fn summarize_columns(dataset: &Dataset) -> ColumnSummaries {
    let total_rows = dataset.rows.len();
    let mut columns = Vec::with_capacity(dataset.columns.len());
    let mut charts = Vec::new();

    for column in &dataset.columns {
        let values = non_null_values(dataset, &column.name);
        let distinct: HashSet<_> = values.iter().map(|v| value_key(v)).collect();

        let mut summary = ColumnSummary {
            name: column.name.clone(),
            column_type: column.column_type,
            non_null_count: values.len(),
            null_count: total_rows - values.len(),
            distinct_count: distinct.len(),
            sample_values: values
                .iter()
                .take(SAMPLE_VALUE_LIMIT)
                .map(|v| (*v).clone())
                .collect(),
            cardinality_bucket: CardinalityBucket::for_distinct_count(distinct.len()),
            numeric_stats: None,
        };

        if column.column_type == ColumnType::Number {
            let nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if !nums.is_empty() {
                let numeric = NumericStats::compute(&nums);
                let bins = stats::histogram(&nums, numeric.min, numeric.max);
                let data = bins
                    .iter()
                    .map(|b| serde_json::to_value(b).unwrap_or(Value::Null))
                    .collect();
                charts.push(Chart::new(
                    ChartSpec::bar(
                        format!("hist-{}-{}", dataset.id, column.name),
                        "binStart",
                        "count",
                    )
                    .with_title(format!("Distribution of {}", column.name)),
                    data,
                ));
                summary.numeric_stats = Some(numeric);
            }
        }

        columns.push(summary);
    }

    ColumnSummaries {
        dataset_id: dataset.id.clone(),
        row_count: total_rows,
        columns,
        charts: some_if_nonempty(charts),
    }
}
