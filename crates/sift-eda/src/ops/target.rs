//! TargetAnalysis operation

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use sift_core::{ColumnType, Dataset};

use crate::charts::{some_if_nonempty, Chart, ChartSpec};
use crate::stats;
use crate::EdaError;

use super::{display_value, value_key, ValueCount, ValueKey};

/// Requested analysis mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    #[default]
    Auto,
    Regression,
    Classification,
}

/// Resolved analysis mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredProblemType {
    Regression,
    Classification,
}

/// Quantile summary of a numeric target
#[derive(Debug, Clone, Serialize)]
pub struct DistributionSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Distribution of the target column
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetDistribution {
    Numeric { summary: DistributionSummary },
    Categorical { values: Vec<ValueCount> },
}

/// One feature ranked by its relationship to the target
#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub measure: String,
    pub score: f64,
}

/// TargetAnalysis result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAnalysis {
    pub dataset_id: String,
    pub target_column: String,
    pub inferred_problem_type: InferredProblemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_distribution: Option<TargetDistribution>,
    pub feature_importance: Vec<FeatureImportance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<Chart>>,
}

/// Analyze a target column: its distribution plus simple relationships with
/// the other features.
///
/// `auto` resolves to regression when the target's inferred column type is
/// `number`, classification otherwise. Regression ranks every other
/// numeric column by `|Pearson correlation|` with the target over rows
/// where both values are numeric, keeping the top `max_features`.
/// Classification reports target value counts with fractions. A target
/// with no numeric values under regression omits the distribution block.
pub fn target_analysis(
    dataset: &Dataset,
    target_column: &str,
    problem_type: ProblemType,
    max_features: usize,
) -> Result<TargetAnalysis, EdaError> {
    let target_meta = dataset
        .column(target_column)
        .ok_or_else(|| EdaError::ColumnNotFound(target_column.to_string()))?;

    let inferred = match problem_type {
        ProblemType::Regression => InferredProblemType::Regression,
        ProblemType::Classification => InferredProblemType::Classification,
        ProblemType::Auto => {
            if target_meta.column_type == ColumnType::Number {
                InferredProblemType::Regression
            } else {
                InferredProblemType::Classification
            }
        }
    };

    let mut charts = Vec::new();
    let mut target_distribution = None;
    let mut feature_importance = Vec::new();

    match inferred {
        InferredProblemType::Regression => {
            let nums: Vec<f64> = dataset
                .rows
                .iter()
                .filter_map(|row| row.get(target_column))
                .filter_map(Value::as_f64)
                .collect();

            if !nums.is_empty() {
                let mut sorted = nums.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let q1 = stats::quantile(&sorted, 0.25);
                let q3 = stats::quantile(&sorted, 0.75);
                let summary = DistributionSummary {
                    min: sorted[0],
                    max: sorted[sorted.len() - 1],
                    mean: stats::mean(&nums),
                    median: stats::quantile(&sorted, 0.5),
                    q1,
                    q3,
                    iqr: q3 - q1,
                };

                let bins = stats::histogram(&nums, summary.min, summary.max);
                charts.push(Chart::new(
                    ChartSpec::bar(
                        format!("target-hist-{}-{}", dataset.id, target_column),
                        "binStart",
                        "count",
                    )
                    .with_title(format!("Distribution of target {target_column}")),
                    bins.iter()
                        .map(|b| serde_json::to_value(b).unwrap_or(Value::Null))
                        .collect(),
                ));
                target_distribution = Some(TargetDistribution::Numeric { summary });
            }

            feature_importance = rank_numeric_features(dataset, target_column, max_features);
            if !feature_importance.is_empty() {
                charts.push(Chart::new(
                    ChartSpec::bar(
                        format!("target-features-{}-{}", dataset.id, target_column),
                        "feature",
                        "score",
                    )
                    .with_title(format!("Top feature relationships with {target_column}")),
                    feature_importance
                        .iter()
                        .map(|f| json!({"feature": f.feature, "score": f.score}))
                        .collect(),
                ));
            }
        }
        InferredProblemType::Classification => {
            let mut counts: HashMap<ValueKey, (String, usize)> = HashMap::new();
            for row in &dataset.rows {
                let Some(v) = row.get(target_column) else { continue };
                if v.is_null() {
                    continue;
                }
                let entry = counts
                    .entry(value_key(v))
                    .or_insert_with(|| (display_value(v), 0));
                entry.1 += 1;
            }
            let total: usize = counts.values().map(|(_, count)| count).sum::<usize>().max(1);

            let mut values: Vec<ValueCount> = counts
                .into_values()
                .map(|(value, count)| ValueCount {
                    value,
                    count,
                    fraction: count as f64 / total as f64,
                })
                .collect();
            values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

            charts.push(Chart::new(
                ChartSpec::bar(
                    format!("target-vc-{}-{}", dataset.id, target_column),
                    "value",
                    "count",
                )
                .with_title(format!("Target distribution for {target_column}")),
                values
                    .iter()
                    .map(|v| json!({"value": v.value, "count": v.count}))
                    .collect(),
            ));
            target_distribution = Some(TargetDistribution::Categorical { values });
        }
    }

    Ok(TargetAnalysis {
        dataset_id: dataset.id.clone(),
        target_column: target_column.to_string(),
        inferred_problem_type: inferred,
        target_distribution,
        feature_importance,
        charts: some_if_nonempty(charts),
    })
}

/// Rank numeric features by `|Pearson|` against a numeric target, over the
/// rows where both values are numeric. Non-finite scores are skipped.
fn rank_numeric_features(
    dataset: &Dataset,
    target_column: &str,
    max_features: usize,
) -> Vec<FeatureImportance> {
    let mut importance: Vec<FeatureImportance> = dataset
        .numeric_column_names()
        .into_iter()
        .filter(|name| *name != target_column)
        .filter_map(|feature| {
            let mut target_vals = Vec::new();
            let mut feature_vals = Vec::new();
            for row in &dataset.rows {
                let (Some(t), Some(f)) = (
                    row.get(target_column).and_then(Value::as_f64),
                    row.get(feature).and_then(Value::as_f64),
                ) else {
                    continue;
                };
                target_vals.push(t);
                feature_vals.push(f);
            }
            let score = stats::pearson(&target_vals, &feature_vals).abs();
            if !score.is_finite() {
                return None;
            }
            Some(FeatureImportance {
                feature: feature.to_string(),
                measure: "abs_pearson".to_string(),
                score,
            })
        })
        .collect();

    importance.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    importance.truncate(max_features);
    importance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::dataset;

    fn housing_dataset() -> Dataset {
        dataset(
            "housing.csv",
            vec![
                json!({"price": 100.0, "sqft": 50.0, "noise": 9.0, "city": "a"}),
                json!({"price": 200.0, "sqft": 100.0, "noise": 1.0, "city": "b"}),
                json!({"price": 300.0, "sqft": 150.0, "noise": 5.0, "city": "a"}),
                json!({"price": 400.0, "sqft": 200.0, "noise": 2.0, "city": "b"}),
            ],
        )
    }

    #[test]
    fn test_auto_infers_regression_for_numeric_target() {
        let result =
            target_analysis(&housing_dataset(), "price", ProblemType::Auto, 10).expect("ok");
        assert_eq!(
            result.inferred_problem_type,
            InferredProblemType::Regression
        );

        let Some(TargetDistribution::Numeric { summary }) = &result.target_distribution else {
            panic!("expected numeric distribution");
        };
        assert_eq!(summary.min, 100.0);
        assert_eq!(summary.max, 400.0);
        assert!(summary.q1 <= summary.median && summary.median <= summary.q3);
    }

    #[test]
    fn test_feature_ranking_puts_perfect_predictor_first() {
        let result =
            target_analysis(&housing_dataset(), "price", ProblemType::Auto, 10).expect("ok");

        assert_eq!(result.feature_importance[0].feature, "sqft");
        assert!((result.feature_importance[0].score - 1.0).abs() < 1e-12);
        assert_eq!(result.feature_importance[0].measure, "abs_pearson");
        // Correlation scores are absolute values.
        assert!(result
            .feature_importance
            .iter()
            .all(|f| (0.0..=1.0).contains(&f.score)));
        // The string column contributes no feature.
        assert!(result.feature_importance.iter().all(|f| f.feature != "city"));
    }

    #[test]
    fn test_max_features_truncates_ranking() {
        let result =
            target_analysis(&housing_dataset(), "price", ProblemType::Auto, 1).expect("ok");
        assert_eq!(result.feature_importance.len(), 1);
    }

    #[test]
    fn test_auto_infers_classification_for_string_target() {
        let result =
            target_analysis(&housing_dataset(), "city", ProblemType::Auto, 10).expect("ok");
        assert_eq!(
            result.inferred_problem_type,
            InferredProblemType::Classification
        );

        let Some(TargetDistribution::Categorical { values }) = &result.target_distribution else {
            panic!("expected categorical distribution");
        };
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].count, 2);
        let sum: f64 = values.iter().map(|v| v.fraction).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(result.feature_importance.is_empty());
    }

    #[test]
    fn test_explicit_problem_type_overrides_inference() {
        let result =
            target_analysis(&housing_dataset(), "price", ProblemType::Classification, 10)
                .expect("ok");
        assert_eq!(
            result.inferred_problem_type,
            InferredProblemType::Classification
        );
    }

    #[test]
    fn test_missing_target_column_is_reported() {
        let err =
            target_analysis(&housing_dataset(), "nope", ProblemType::Auto, 10).unwrap_err();
        assert!(matches!(err, EdaError::ColumnNotFound(_)));
    }

    #[test]
    fn test_regression_without_numeric_values_omits_distribution() {
        // Numeric-string column infers `number` but holds no JSON numbers.
        let ds = dataset("s.csv", vec![json!({"v": "1"}), json!({"v": "2"})]);
        let result = target_analysis(&ds, "v", ProblemType::Auto, 10).expect("ok");
        assert_eq!(
            result.inferred_problem_type,
            InferredProblemType::Regression
        );
        assert!(result.target_distribution.is_none());
        assert!(result.charts.is_none());
    }
}
