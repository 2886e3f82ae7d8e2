//! Tool abstraction module
//!
//! This module defines the Tool trait and related types:
//! - Tool: a named operation the model can invoke during a run
//! - ToolInput: the JSON arguments of one invocation
//! - ToolContext: call context with access to the dataset store
//! - ToolMeta: name, description, and input schema advertised to the model
//!
//! Tools return a single `serde_json::Value`. Reportable failures (unknown
//! dataset, unknown column, malformed parameters) are returned as
//! `{"error": "..."}` values, never raised: any caller can branch on the
//! presence of the `error` field alone.

mod context;
mod input;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use context::ToolContext;
pub use input::ToolInput;

// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;

/// Tool trait - a named, independently invocable operation
///
/// Tools are black boxes to the run loop. Each call is expected to complete
/// synchronously with respect to the step (no background work), and
/// repeated calls with the same input against an unchanged dataset return
/// the same result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name (must be unique; this is the wire name the model sees)
    fn name(&self) -> &str;

    /// Get the tool description (for the model's tool selection)
    fn description(&self) -> &str;

    /// Get tool metadata (input schema advertised to the model)
    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description())
    }

    /// Execute one invocation
    async fn call(&self, input: ToolInput, ctx: ToolContext) -> Value;
}

/// Tool metadata advertised to the model provider
#[derive(Debug, Clone, Serialize)]
pub struct ToolMeta {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema for the invocation arguments
    pub input_schema: Value,
}

impl ToolMeta {
    /// Create new tool metadata
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Null,
        }
    }

    /// Set input schema.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Build the uniform `{"error": ...}` result value
pub fn error_value(message: impl Into<String>) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("error".to_string(), Value::String(message.into()));
    Value::Object(map)
}

/// Tool registry for looking up tools by name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with the given name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all registered tool names
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Metadata for the given names, in the given order, skipping
    /// names with no registered tool
    pub fn metas_for(&self, names: &[String]) -> Vec<ToolMeta> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.metadata()))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
