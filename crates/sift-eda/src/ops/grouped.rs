//! GroupedSummary and TopSegments operations

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sift_core::Dataset;

use crate::charts::{some_if_nonempty, Chart, ChartSpec};
use crate::stats;
use crate::EdaError;

use super::{display_value, require_column};

/// GroupedSummary result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedSummary {
    pub dataset_id: String,
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<Chart>>,
}

/// Group rows by the tuple of group-by column values (compared by string
/// coercion) and compute count, sum, mean, and median per numeric metric
/// within each group. Output rows carry the original group key fields plus
/// `count` and `<metric>_sum` / `<metric>_mean` / `<metric>_median` for
/// each metric with at least one numeric value in the group.
pub fn grouped_summary(
    dataset: &Dataset,
    group_by: &[String],
    metrics: &[String],
) -> Result<GroupedSummary, EdaError> {
    if group_by.is_empty() {
        return Err(EdaError::InvalidParams(
            "groupBy must name at least one column".to_string(),
        ));
    }
    if metrics.is_empty() {
        return Err(EdaError::InvalidParams(
            "metrics must name at least one column".to_string(),
        ));
    }
    for column in group_by.iter().chain(metrics.iter()) {
        require_column(dataset, column)?;
    }

    // Deduplicate metrics while keeping first-mention order.
    let mut metric_list: Vec<&String> = Vec::new();
    for m in metrics {
        if !metric_list.contains(&m) {
            metric_list.push(m);
        }
    }

    struct Group {
        key_values: Map<String, Value>,
        count: usize,
        values: HashMap<String, Vec<f64>>,
    }

    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for row in &dataset.rows {
        let mut key_values = Map::new();
        let mut key_parts = Vec::with_capacity(group_by.len());
        for g in group_by {
            let v = row.get(g).cloned().unwrap_or(Value::Null);
            key_parts.push(format!("{}={}", g, display_value(&v)));
            key_values.insert(g.clone(), v);
        }
        let key = key_parts.join("|");

        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Group {
                key_values,
                count: 0,
                values: HashMap::new(),
            }
        });
        group.count += 1;
        for m in &metric_list {
            if let Some(v) = row.get(m.as_str()).and_then(Value::as_f64) {
                group.values.entry((*m).clone()).or_default().push(v);
            }
        }
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in &order {
        let group = &groups[key];
        let mut out = group.key_values.clone();
        out.insert("count".to_string(), group.count.into());
        for m in &metric_list {
            let Some(vals) = group.values.get(m.as_str()) else {
                continue;
            };
            if vals.is_empty() {
                continue;
            }
            let mut sorted = vals.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let sum: f64 = vals.iter().sum();
            out.insert(format!("{m}_sum"), sum.into());
            out.insert(format!("{m}_mean"), (sum / vals.len() as f64).into());
            out.insert(format!("{m}_median"), stats::quantile(&sorted, 0.5).into());
        }
        rows.push(out);
    }

    // One obvious chart shape exists only for the single-key single-metric case.
    let mut charts = Vec::new();
    if group_by.len() == 1 && metric_list.len() == 1 {
        let g = &group_by[0];
        let m = metric_list[0];
        charts.push(Chart::new(
            ChartSpec::bar(
                format!("grouped-{}-{}-{}", dataset.id, g, m),
                g.clone(),
                format!("{m}_mean"),
            )
            .with_title(format!("{m} by {g}")),
            rows.iter().map(|r| Value::Object(r.clone())).collect(),
        ));
    }

    Ok(GroupedSummary {
        dataset_id: dataset.id.clone(),
        group_by: group_by.to_vec(),
        metrics: metrics.to_vec(),
        rows,
        charts: some_if_nonempty(charts),
    })
}

/// Segment sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// One segment with its metric aggregates
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub segment: String,
    pub count: usize,
    pub mean: f64,
    pub sum: f64,
}

/// TopSegments result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSegments {
    pub dataset_id: String,
    pub group_by_column: String,
    pub metric_column: String,
    pub direction: SortDirection,
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<Chart>>,
}

/// Group by a single column (null keys skipped), aggregate the metric over
/// numeric values only, sort segments by mean in the requested direction,
/// and keep the top `limit`.
pub fn top_segments(
    dataset: &Dataset,
    group_by_column: &str,
    metric_column: &str,
    direction: SortDirection,
    limit: usize,
) -> Result<TopSegments, EdaError> {
    require_column(dataset, group_by_column)?;
    require_column(dataset, metric_column)?;

    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for row in &dataset.rows {
        let Some(g) = row.get(group_by_column) else { continue };
        if g.is_null() {
            continue;
        }
        let Some(v) = row.get(metric_column).and_then(Value::as_f64) else {
            continue;
        };
        let key = display_value(g);
        let entry = sums.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0.0, 0)
        });
        entry.0 += v;
        entry.1 += 1;
    }

    let mut segments: Vec<Segment> = order
        .into_iter()
        .map(|segment| {
            let (sum, count) = sums[&segment];
            Segment {
                segment,
                count,
                mean: sum / count as f64,
                sum,
            }
        })
        .collect();

    segments.sort_by(|a, b| {
        let ordering = a
            .mean
            .partial_cmp(&b.mean)
            .unwrap_or(std::cmp::Ordering::Equal);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    segments.truncate(limit);

    let chart = Chart::new(
        ChartSpec::bar(
            format!(
                "topsegments-{}-{}-{}",
                dataset.id, group_by_column, metric_column
            ),
            "segment",
            "mean",
        )
        .with_title(format!("Top segments by {metric_column}")),
        segments
            .iter()
            .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
            .collect(),
    );

    Ok(TopSegments {
        dataset_id: dataset.id.clone(),
        group_by_column: group_by_column.to_string(),
        metric_column: metric_column.to_string(),
        direction,
        segments,
        charts: Some(vec![chart]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::dataset;
    use serde_json::json;

    fn region_dataset() -> Dataset {
        dataset(
            "regions.csv",
            vec![
                json!({"region": "west", "tier": "a", "revenue": 10.0, "units": 1.0}),
                json!({"region": "west", "tier": "a", "revenue": 20.0, "units": 2.0}),
                json!({"region": "east", "tier": "a", "revenue": 50.0, "units": 5.0}),
                json!({"region": "east", "tier": "b", "revenue": 70.0, "units": null}),
                json!({"region": "west", "tier": "b", "revenue": 30.0, "units": 3.0}),
            ],
        )
    }

    #[test]
    fn test_grouped_summary_single_key() {
        let result = grouped_summary(
            &region_dataset(),
            &["region".to_string()],
            &["revenue".to_string()],
        )
        .expect("ok");

        assert_eq!(result.rows.len(), 2);
        let west = &result.rows[0];
        assert_eq!(west["region"], json!("west"));
        assert_eq!(west["count"], json!(3));
        assert_eq!(west["revenue_sum"], json!(60.0));
        assert_eq!(west["revenue_mean"], json!(20.0));
        assert_eq!(west["revenue_median"], json!(20.0));

        let east = &result.rows[1];
        assert_eq!(east["count"], json!(2));
        assert_eq!(east["revenue_sum"], json!(120.0));
    }

    #[test]
    fn test_grouped_summary_tuple_key_and_skipped_empty_metric() {
        let result = grouped_summary(
            &region_dataset(),
            &["region".to_string(), "tier".to_string()],
            &["units".to_string()],
        )
        .expect("ok");

        assert_eq!(result.rows.len(), 4);
        // The (east, b) group has only a null units value: metric fields absent.
        let east_b = result
            .rows
            .iter()
            .find(|r| r["region"] == json!("east") && r["tier"] == json!("b"))
            .expect("group present");
        assert_eq!(east_b["count"], json!(1));
        assert!(east_b.get("units_sum").is_none());
    }

    #[test]
    fn test_grouped_summary_median_interpolates_even_counts() {
        let ds = dataset(
            "evens.csv",
            vec![
                json!({"g": "x", "m": 1.0}),
                json!({"g": "x", "m": 2.0}),
                json!({"g": "x", "m": 3.0}),
                json!({"g": "x", "m": 10.0}),
            ],
        );
        let result =
            grouped_summary(&ds, &["g".to_string()], &["m".to_string()]).expect("ok");
        assert_eq!(result.rows[0]["m_median"], json!(2.5));
    }

    #[test]
    fn test_grouped_summary_rejects_empty_and_unknown_inputs() {
        let ds = region_dataset();
        assert!(matches!(
            grouped_summary(&ds, &[], &["revenue".to_string()]).unwrap_err(),
            EdaError::InvalidParams(_)
        ));
        assert!(matches!(
            grouped_summary(&ds, &["region".to_string()], &[]).unwrap_err(),
            EdaError::InvalidParams(_)
        ));
        assert!(matches!(
            grouped_summary(&ds, &["region".to_string()], &["nope".to_string()]).unwrap_err(),
            EdaError::ColumnNotFound(_)
        ));
    }

    #[test]
    fn test_grouped_summary_chart_only_for_single_key_single_metric() {
        let ds = region_dataset();
        let single = grouped_summary(&ds, &["region".to_string()], &["revenue".to_string()])
            .expect("ok");
        assert!(single.charts.is_some());

        let double = grouped_summary(
            &ds,
            &["region".to_string(), "tier".to_string()],
            &["revenue".to_string()],
        )
        .expect("ok");
        assert!(double.charts.is_none());
    }

    #[test]
    fn test_top_segments_sorts_by_mean_desc_by_default() {
        let result = top_segments(
            &region_dataset(),
            "region",
            "revenue",
            SortDirection::Desc,
            10,
        )
        .expect("ok");

        assert_eq!(result.segments[0].segment, "east");
        assert_eq!(result.segments[0].mean, 60.0);
        assert_eq!(result.segments[0].count, 2);
        assert_eq!(result.segments[1].segment, "west");
        assert_eq!(result.segments[1].sum, 60.0);
    }

    #[test]
    fn test_top_segments_asc_and_limit() {
        let result = top_segments(
            &region_dataset(),
            "region",
            "revenue",
            SortDirection::Asc,
            1,
        )
        .expect("ok");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].segment, "west");
    }

    #[test]
    fn test_top_segments_skips_null_groups_and_non_numeric_metrics() {
        let ds = dataset(
            "sparse.csv",
            vec![
                json!({"g": null, "m": 100.0}),
                json!({"g": "a", "m": "oops"}),
                json!({"g": "a", "m": 4.0}),
            ],
        );
        let result = top_segments(&ds, "g", "m", SortDirection::Desc, 10).expect("ok");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].count, 1);
        assert_eq!(result.segments[0].mean, 4.0);
    }
}
