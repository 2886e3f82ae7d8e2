//! ToolInput type definition

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments for one tool invocation (from the model's tool call)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    /// JSON arguments as proposed by the model
    #[serde(default)]
    pub params: Value,
}

impl ToolInput {
    /// Create a new empty input
    pub fn new() -> Self {
        Self::default()
    }

    /// Create input with params
    pub fn with_params(params: Value) -> Self {
        Self { params }
    }

    /// Get a string parameter
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// Get a non-empty string parameter
    pub fn required_str(&self, key: &str) -> Option<&str> {
        self.str_param(key).filter(|s| !s.is_empty())
    }

    /// Get an unsigned integer parameter
    pub fn u64_param(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    /// Get a string-array parameter
    pub fn str_array_param(&self, key: &str) -> Option<Vec<String>> {
        self.params.get(key).and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|item| item.as_str().map(|s| s.to_string()))
                    .collect()
            })
        })
    }
}
