//! Model-facing tools wrapping the statistics engine
//!
//! Each tool validates parameters at the boundary, looks up the dataset,
//! calls the pure operation, and serializes the result. Every reportable
//! failure becomes a `{"error": "..."}` value: the run loop treats it like
//! any successful tool result and the model explains it in prose.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use sift_core::phase::tool_names;
use sift_core::tool::{error_value, Tool, ToolContext, ToolInput, ToolMeta};
use sift_core::{Dataset, DatasetStore, ToolRegistry};

use crate::ops::{
    self, Granularity, ProblemType, SortDirection,
};
use crate::EdaError;

const DEFAULT_VALUE_COUNT_LIMIT: u64 = 10;
const DEFAULT_TOP_SEGMENT_LIMIT: u64 = 10;
const DEFAULT_MAX_POINTS: u64 = 1_000;
const DEFAULT_MAX_FEATURES: u64 = 10;
const MAX_MOVING_AVERAGE_WINDOW: u64 = 60;

/// Register all eleven statistics tools against a shared dataset store.
pub fn install_statistics_tools(registry: &mut ToolRegistry, store: &Arc<DatasetStore>) {
    registry.register(Arc::new(DescribeDatasetTool::new(store.clone())));
    registry.register(Arc::new(SummarizeColumnsTool::new(store.clone())));
    registry.register(Arc::new(ValueCountsTool::new(store.clone())));
    registry.register(Arc::new(TimeSeriesSliceTool::new(store.clone())));
    registry.register(Arc::new(CorrelationMatrixTool::new(store.clone())));
    registry.register(Arc::new(TargetAnalysisTool::new(store.clone())));
    registry.register(Arc::new(GroupedSummaryTool::new(store.clone())));
    registry.register(Arc::new(TopSegmentsTool::new(store.clone())));
    registry.register(Arc::new(RelationshipDrilldownTool::new(store.clone())));
    registry.register(Arc::new(MissingValuesSummaryTool::new(store.clone())));
    registry.register(Arc::new(GenerateEdaReportTool::new(store.clone())));
}

fn lookup_dataset(store: &DatasetStore, input: &ToolInput) -> Result<Arc<Dataset>, EdaError> {
    let id = input
        .required_str("datasetId")
        .ok_or_else(|| EdaError::InvalidParams("datasetId is required".to_string()))?;
    match store.get(id) {
        Ok(Some(dataset)) => Ok(dataset),
        Ok(None) => Err(EdaError::DatasetNotFound(id.to_string())),
        Err(e) => Err(EdaError::Internal(e.to_string())),
    }
}

fn respond<T: Serialize>(tool: &str, result: Result<T, EdaError>) -> Value {
    match result {
        Ok(payload) => serde_json::to_value(&payload)
            .unwrap_or_else(|e| error_value(format!("Failed to serialize result: {e}"))),
        Err(e) => {
            tracing::debug!(tool = %tool, error = %e, "statistics tool returned error result");
            error_value(e.to_string())
        }
    }
}

fn required_str(input: &ToolInput, key: &str) -> Result<String, EdaError> {
    input
        .required_str(key)
        .map(|s| s.to_string())
        .ok_or_else(|| EdaError::InvalidParams(format!("{key} is required")))
}

fn clamped_limit(input: &ToolInput, key: &str, default: u64, min: u64, max: u64) -> usize {
    input.u64_param(key).unwrap_or(default).clamp(min, max) as usize
}

fn parse_granularity(input: &ToolInput) -> Result<Granularity, EdaError> {
    match input.str_param("granularity") {
        None => Ok(Granularity::default()),
        Some("raw") => Ok(Granularity::Raw),
        Some("day") => Ok(Granularity::Day),
        Some("week") => Ok(Granularity::Week),
        Some("month") => Ok(Granularity::Month),
        Some(other) => Err(EdaError::InvalidParams(format!(
            "granularity must be one of raw|day|week|month, got '{other}'"
        ))),
    }
}

fn parse_direction(input: &ToolInput) -> Result<SortDirection, EdaError> {
    match input.str_param("direction") {
        None => Ok(SortDirection::default()),
        Some("asc") => Ok(SortDirection::Asc),
        Some("desc") => Ok(SortDirection::Desc),
        Some(other) => Err(EdaError::InvalidParams(format!(
            "direction must be 'asc' or 'desc', got '{other}'"
        ))),
    }
}

fn parse_problem_type(input: &ToolInput) -> Result<ProblemType, EdaError> {
    match input.str_param("problemType") {
        None => Ok(ProblemType::default()),
        Some("auto") => Ok(ProblemType::Auto),
        Some("regression") => Ok(ProblemType::Regression),
        Some("classification") => Ok(ProblemType::Classification),
        Some(other) => Err(EdaError::InvalidParams(format!(
            "problemType must be one of auto|regression|classification, got '{other}'"
        ))),
    }
}

fn dataset_id_property() -> Value {
    json!({
        "type": "string",
        "description": "The id of the dataset to analyze, as provided in context."
    })
}

fn dataset_only_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "datasetId": dataset_id_property() },
        "required": ["datasetId"]
    })
}

macro_rules! store_tool {
    ($name:ident) => {
        pub struct $name {
            store: Arc<DatasetStore>,
        }

        impl $name {
            pub fn new(store: Arc<DatasetStore>) -> Self {
                Self { store }
            }
        }
    };
}

store_tool!(DescribeDatasetTool);

#[async_trait]
impl Tool for DescribeDatasetTool {
    fn name(&self) -> &str {
        tool_names::DESCRIBE_DATASET
    }

    fn description(&self) -> &str {
        "Describe the currently selected dataset: schema, row count, and basic column types."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(dataset_only_schema())
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result = lookup_dataset(&self.store, &input).map(|dataset| dataset.summary());
        respond(self.name(), result)
    }
}

store_tool!(SummarizeColumnsTool);

#[async_trait]
impl Tool for SummarizeColumnsTool {
    fn name(&self) -> &str {
        tool_names::SUMMARIZE_COLUMNS
    }

    fn description(&self) -> &str {
        "Compute summary statistics for each column in the dataset (counts, distincts, numeric distribution stats)."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(dataset_only_schema())
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result =
            lookup_dataset(&self.store, &input).map(|dataset| ops::summarize_columns(&dataset));
        respond(self.name(), result)
    }
}

store_tool!(ValueCountsTool);

#[async_trait]
impl Tool for ValueCountsTool {
    fn name(&self) -> &str {
        tool_names::VALUE_COUNTS
    }

    fn description(&self) -> &str {
        "Compute value counts for a single column in the dataset (top N categories)."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(json!({
            "type": "object",
            "properties": {
                "datasetId": dataset_id_property(),
                "column": {
                    "type": "string",
                    "description": "The column name to compute value counts for."
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50,
                    "default": DEFAULT_VALUE_COUNT_LIMIT,
                    "description": "Maximum number of distinct values to return."
                }
            },
            "required": ["datasetId", "column"]
        }))
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let limit = clamped_limit(&input, "limit", DEFAULT_VALUE_COUNT_LIMIT, 1, 50);
        let result = lookup_dataset(&self.store, &input).and_then(|dataset| {
            let column = required_str(&input, "column")?;
            ops::value_counts(&dataset, &column, limit)
        });
        respond(self.name(), result)
    }
}

store_tool!(TimeSeriesSliceTool);

#[async_trait]
impl Tool for TimeSeriesSliceTool {
    fn name(&self) -> &str {
        tool_names::TIME_SERIES_SLICE
    }

    fn description(&self) -> &str {
        "Aggregate a numeric value column over a date column to produce a time series."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(json!({
            "type": "object",
            "properties": {
                "datasetId": dataset_id_property(),
                "dateColumn": { "type": "string" },
                "valueColumn": { "type": "string" },
                "granularity": {
                    "type": "string",
                    "enum": ["raw", "day", "week", "month"],
                    "default": "raw"
                },
                "movingAverageWindow": {
                    "type": "integer",
                    "minimum": 2,
                    "maximum": MAX_MOVING_AVERAGE_WINDOW,
                    "description": "Trailing moving average window in points."
                }
            },
            "required": ["datasetId", "dateColumn", "valueColumn"]
        }))
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result = lookup_dataset(&self.store, &input).and_then(|dataset| {
            let date_column = required_str(&input, "dateColumn")?;
            let value_column = required_str(&input, "valueColumn")?;
            let granularity = parse_granularity(&input)?;
            let window = input
                .u64_param("movingAverageWindow")
                .filter(|w| *w >= 2)
                .map(|w| w.min(MAX_MOVING_AVERAGE_WINDOW) as usize);
            ops::time_series_slice(&dataset, &date_column, &value_column, granularity, window)
        });
        respond(self.name(), result)
    }
}

store_tool!(CorrelationMatrixTool);

#[async_trait]
impl Tool for CorrelationMatrixTool {
    fn name(&self) -> &str {
        tool_names::CORRELATION_MATRIX
    }

    fn description(&self) -> &str {
        "Compute a Pearson correlation matrix between the numeric columns in the dataset."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(dataset_only_schema())
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result =
            lookup_dataset(&self.store, &input).map(|dataset| ops::correlation_matrix(&dataset));
        respond(self.name(), result)
    }
}

store_tool!(TargetAnalysisTool);

#[async_trait]
impl Tool for TargetAnalysisTool {
    fn name(&self) -> &str {
        tool_names::TARGET_ANALYSIS
    }

    fn description(&self) -> &str {
        "Analyze a target column: its distribution and simple relationships with other features."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(json!({
            "type": "object",
            "properties": {
                "datasetId": dataset_id_property(),
                "targetColumn": { "type": "string" },
                "problemType": {
                    "type": "string",
                    "enum": ["auto", "regression", "classification"],
                    "default": "auto"
                },
                "maxFeatures": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50,
                    "default": DEFAULT_MAX_FEATURES
                }
            },
            "required": ["datasetId", "targetColumn"]
        }))
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let max_features = clamped_limit(&input, "maxFeatures", DEFAULT_MAX_FEATURES, 1, 50);
        let result = lookup_dataset(&self.store, &input).and_then(|dataset| {
            let target_column = required_str(&input, "targetColumn")?;
            let problem_type = parse_problem_type(&input)?;
            ops::target_analysis(&dataset, &target_column, problem_type, max_features)
        });
        respond(self.name(), result)
    }
}

store_tool!(GroupedSummaryTool);

#[async_trait]
impl Tool for GroupedSummaryTool {
    fn name(&self) -> &str {
        tool_names::GROUPED_SUMMARY
    }

    fn description(&self) -> &str {
        "Compute grouped summaries (count, sum, mean, median) for numeric metrics by one or more categorical columns."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(json!({
            "type": "object",
            "properties": {
                "datasetId": dataset_id_property(),
                "groupBy": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1
                },
                "metrics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1
                }
            },
            "required": ["datasetId", "groupBy", "metrics"]
        }))
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result = lookup_dataset(&self.store, &input).and_then(|dataset| {
            let group_by = input
                .str_array_param("groupBy")
                .ok_or_else(|| EdaError::InvalidParams("groupBy is required".to_string()))?;
            let metrics = input
                .str_array_param("metrics")
                .ok_or_else(|| EdaError::InvalidParams("metrics is required".to_string()))?;
            ops::grouped_summary(&dataset, &group_by, &metrics)
        });
        respond(self.name(), result)
    }
}

store_tool!(TopSegmentsTool);

#[async_trait]
impl Tool for TopSegmentsTool {
    fn name(&self) -> &str {
        tool_names::TOP_SEGMENTS
    }

    fn description(&self) -> &str {
        "Find top segments for a numeric metric grouped by a single categorical column."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(json!({
            "type": "object",
            "properties": {
                "datasetId": dataset_id_property(),
                "groupByColumn": { "type": "string" },
                "metricColumn": { "type": "string" },
                "direction": {
                    "type": "string",
                    "enum": ["asc", "desc"],
                    "default": "desc"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50,
                    "default": DEFAULT_TOP_SEGMENT_LIMIT
                }
            },
            "required": ["datasetId", "groupByColumn", "metricColumn"]
        }))
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let limit = clamped_limit(&input, "limit", DEFAULT_TOP_SEGMENT_LIMIT, 1, 50);
        let result = lookup_dataset(&self.store, &input).and_then(|dataset| {
            let group_by_column = required_str(&input, "groupByColumn")?;
            let metric_column = required_str(&input, "metricColumn")?;
            let direction = parse_direction(&input)?;
            ops::top_segments(&dataset, &group_by_column, &metric_column, direction, limit)
        });
        respond(self.name(), result)
    }
}

store_tool!(RelationshipDrilldownTool);

#[async_trait]
impl Tool for RelationshipDrilldownTool {
    fn name(&self) -> &str {
        tool_names::RELATIONSHIP_DRILLDOWN
    }

    fn description(&self) -> &str {
        "Return sampled pairs of two columns for relationship analysis (numeric-numeric or categorical-numeric)."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(json!({
            "type": "object",
            "properties": {
                "datasetId": dataset_id_property(),
                "xColumn": { "type": "string" },
                "yColumn": { "type": "string" },
                "maxPoints": {
                    "type": "integer",
                    "minimum": 10,
                    "maximum": 5000,
                    "default": DEFAULT_MAX_POINTS
                }
            },
            "required": ["datasetId", "xColumn", "yColumn"]
        }))
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let max_points = clamped_limit(&input, "maxPoints", DEFAULT_MAX_POINTS, 10, 5_000);
        let result = lookup_dataset(&self.store, &input).and_then(|dataset| {
            let x_column = required_str(&input, "xColumn")?;
            let y_column = required_str(&input, "yColumn")?;
            ops::relationship_drilldown(&dataset, &x_column, &y_column, max_points)
        });
        respond(self.name(), result)
    }
}

store_tool!(MissingValuesSummaryTool);

#[async_trait]
impl Tool for MissingValuesSummaryTool {
    fn name(&self) -> &str {
        tool_names::MISSING_VALUES_SUMMARY
    }

    fn description(&self) -> &str {
        "Summarize missing values per column: counts and percentage of missing entries."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(dataset_only_schema())
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result = lookup_dataset(&self.store, &input)
            .map(|dataset| ops::missing_values_summary(&dataset));
        respond(self.name(), result)
    }
}

store_tool!(GenerateEdaReportTool);

#[async_trait]
impl Tool for GenerateEdaReportTool {
    fn name(&self) -> &str {
        tool_names::GENERATE_EDA_REPORT
    }

    fn description(&self) -> &str {
        "Generate a high-level EDA report structure for the dataset based on summaries and correlations."
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_input_schema(dataset_only_schema())
    }

    async fn call(&self, input: ToolInput, _ctx: ToolContext) -> Value {
        let result =
            lookup_dataset(&self.store, &input).map(|dataset| ops::generate_eda_report(&dataset));
        respond(self.name(), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_dataset() -> (Arc<DatasetStore>, String) {
        let store = Arc::new(DatasetStore::new());
        let rows = vec![
            json!({"x": 1.0, "y": 2.0, "cat": "a"}),
            json!({"x": 2.0, "y": 4.0, "cat": "b"}),
            json!({"x": 3.0, "y": 6.0, "cat": "a"}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();
        let summary = store.add_dataset("tools.csv", rows).expect("add");
        (store, summary.id)
    }

    fn ctx(store: &Arc<DatasetStore>) -> ToolContext {
        ToolContext::new("run-test", "call-test", store.clone())
    }

    #[test]
    fn test_unknown_dataset_id_returns_error_value_not_panic() {
        tokio_test::block_on(async {
            let (store, _) = store_with_dataset();
            let input = ToolInput::with_params(json!({"datasetId": "missing"}));

            for tool in [
                Box::new(DescribeDatasetTool::new(store.clone())) as Box<dyn Tool>,
                Box::new(SummarizeColumnsTool::new(store.clone())),
                Box::new(CorrelationMatrixTool::new(store.clone())),
                Box::new(MissingValuesSummaryTool::new(store.clone())),
                Box::new(GenerateEdaReportTool::new(store.clone())),
            ] {
                let out = tool.call(input.clone(), ctx(&store)).await;
                let message = out["error"].as_str().expect("error field");
                assert!(message.contains("not found"), "{message}");
            }
        });
    }

    #[test]
    fn test_describe_dataset_returns_stored_summary() {
        tokio_test::block_on(async {
            let (store, id) = store_with_dataset();
            let tool = DescribeDatasetTool::new(store.clone());
            let out = tool
                .call(ToolInput::with_params(json!({"datasetId": id})), ctx(&store))
                .await;

            assert_eq!(out["rowCount"], json!(3));
            assert_eq!(out["name"], json!("tools.csv"));
            assert_eq!(out["columns"][0]["type"], json!("number"));
            assert!(out.get("error").is_none());
        });
    }

    #[test]
    fn test_value_counts_limit_is_clamped_into_range() {
        tokio_test::block_on(async {
            let (store, id) = store_with_dataset();
            let tool = ValueCountsTool::new(store.clone());

            // limit 9999 clamps to 50; both distinct values survive.
            let out = tool
                .call(
                    ToolInput::with_params(
                        json!({"datasetId": id.clone(), "column": "cat", "limit": 9999}),
                    ),
                    ctx(&store),
                )
                .await;
            assert_eq!(out["values"].as_array().unwrap().len(), 2);

            // limit 0 clamps to 1.
            let out = tool
                .call(
                    ToolInput::with_params(
                        json!({"datasetId": id.clone(), "column": "cat", "limit": 0}),
                    ),
                    ctx(&store),
                )
                .await;
            assert_eq!(out["values"].as_array().unwrap().len(), 1);
        });
    }

    #[test]
    fn test_invalid_enum_parameter_is_rejected_at_the_boundary() {
        tokio_test::block_on(async {
            let (store, id) = store_with_dataset();
            let tool = TimeSeriesSliceTool::new(store.clone());
            let out = tool
                .call(
                    ToolInput::with_params(json!({
                        "datasetId": id,
                        "dateColumn": "x",
                        "valueColumn": "y",
                        "granularity": "decade"
                    })),
                    ctx(&store),
                )
                .await;
            assert!(out["error"].as_str().unwrap().contains("granularity"));
        });
    }

    #[test]
    fn test_missing_required_parameter_is_reported() {
        tokio_test::block_on(async {
            let (store, id) = store_with_dataset();
            let tool = ValueCountsTool::new(store.clone());
            let out = tool
                .call(ToolInput::with_params(json!({"datasetId": id})), ctx(&store))
                .await;
            assert!(out["error"].as_str().unwrap().contains("column"));
        });
    }

    #[test]
    fn test_correlation_tool_end_to_end() {
        tokio_test::block_on(async {
            let (store, id) = store_with_dataset();
            let tool = CorrelationMatrixTool::new(store.clone());
            let out = tool
                .call(ToolInput::with_params(json!({"datasetId": id})), ctx(&store))
                .await;

            assert_eq!(out["numericColumns"], json!(["x", "y"]));
            let r = out["matrix"]["x"]["y"].as_f64().unwrap();
            assert!((r - 1.0).abs() < 1e-12);
        });
    }

    #[test]
    fn test_install_registers_all_eleven_tools() {
        let (store, _) = store_with_dataset();
        let mut registry = ToolRegistry::new();
        install_statistics_tools(&mut registry, &store);

        for name in tool_names::STATISTICS_TOOLS {
            assert!(registry.contains(name), "missing tool {name}");
        }
        assert_eq!(registry.names().len(), 11);
    }

    #[test]
    fn test_metadata_advertises_input_schema() {
        let (store, _) = store_with_dataset();
        let tool = ValueCountsTool::new(store);
        let meta = tool.metadata();
        assert_eq!(meta.name, "ValueCounts");
        assert_eq!(meta.input_schema["properties"]["limit"]["maximum"], json!(50));
        assert_eq!(
            meta.input_schema["required"],
            json!(["datasetId", "column"])
        );
    }
}
