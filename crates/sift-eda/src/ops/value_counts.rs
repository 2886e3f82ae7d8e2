//! ValueCounts operation

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use sift_core::Dataset;

use crate::charts::{Chart, ChartSpec};
use crate::EdaError;

use super::{display_value, require_column, value_key, ValueKey};

/// One distinct value with its occurrence count
#[derive(Debug, Clone, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    pub fraction: f64,
}

/// ValueCounts result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueCounts {
    pub dataset_id: String,
    pub column: String,
    pub total_non_null: usize,
    pub values: Vec<ValueCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<Chart>>,
}

/// Count occurrences of each distinct non-null value of a column and return
/// the top `limit`, sorted descending by count (ties broken by display
/// value for determinism). Distinctness uses the same key coercion as the
/// column summaries: numbers and booleans as-is, everything else
/// stringified. Fractions are relative to the total non-null count, so they
/// sum to 1 exactly when `limit` covers every distinct value.
pub fn value_counts(dataset: &Dataset, column: &str, limit: usize) -> Result<ValueCounts, EdaError> {
    require_column(dataset, column)?;

    let mut counts: HashMap<ValueKey, (String, usize)> = HashMap::new();
    for row in &dataset.rows {
        let Some(raw) = row.get(column) else { continue };
        if raw.is_null() {
            continue;
        }
        let entry = counts
            .entry(value_key(raw))
            .or_insert_with(|| (display_value(raw), 0));
        entry.1 += 1;
    }

    let total: usize = counts.values().map(|(_, count)| count).sum();

    let mut entries: Vec<(String, usize)> = counts.into_values().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let values: Vec<ValueCount> = entries
        .into_iter()
        .take(limit)
        .map(|(value, count)| ValueCount {
            value,
            count,
            fraction: if total > 0 {
                count as f64 / total as f64
            } else {
                0.0
            },
        })
        .collect();

    let chart_data = values
        .iter()
        .map(|v| json!({"value": v.value, "count": v.count}))
        .collect();
    let chart = Chart::new(
        ChartSpec::bar(
            format!("value-counts-{}-{}", dataset.id, column),
            "value",
            "count",
        )
        .with_title(format!("Value counts for {column}")),
        chart_data,
    );

    Ok(ValueCounts {
        dataset_id: dataset.id.clone(),
        column: column.to_string(),
        total_non_null: total,
        values,
        charts: Some(vec![chart]),
    })
}
