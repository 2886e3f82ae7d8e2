//! Chart payload convention
//!
//! Operations that produce a renderable series attach an optional `charts`
//! array to their result. The payload is purely additive: non-visual
//! consumers ignore it.

use serde::Serialize;
use serde_json::Value;

/// Renderable chart kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
}

/// Declarative chart description
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_field: String,
    pub y_field: String,
}

impl ChartSpec {
    /// Create a bar chart spec
    pub fn bar(id: impl Into<String>, x_field: impl Into<String>, y_field: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            chart_type: ChartType::Bar,
            x_field: x_field.into(),
            y_field: y_field.into(),
        }
    }

    /// Create a line chart spec
    pub fn line(
        id: impl Into<String>,
        x_field: impl Into<String>,
        y_field: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: None,
            chart_type: ChartType::Line,
            x_field: x_field.into(),
            y_field: y_field.into(),
        }
    }

    /// Set the chart title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A chart spec plus its data points
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub spec: ChartSpec,
    pub data: Vec<Value>,
}

impl Chart {
    pub fn new(spec: ChartSpec, data: Vec<Value>) -> Self {
        Self { spec, data }
    }
}

/// Wrap charts for an optional result field: `None` when empty so the
/// `charts` key is omitted entirely.
pub fn some_if_nonempty(charts: Vec<Chart>) -> Option<Vec<Chart>> {
    if charts.is_empty() {
        None
    } else {
        Some(charts)
    }
}
