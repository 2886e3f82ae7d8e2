//! ToolContext type definition

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::dataset::DatasetStore;

/// Call context for tool invocations
///
/// Provides access to:
/// - Run and call identification (for logs)
/// - The dataset store (read-only use; tools never mutate datasets)
/// - CancellationToken for cooperative cancellation
#[derive(Clone)]
pub struct ToolContext {
    /// Run ID
    pub run_id: String,
    /// Provider-assigned id of this tool call
    pub call_id: String,
    /// Dataset store shared across the process
    pub store: Arc<DatasetStore>,
    /// Cancellation token; in-flight calls may finish, long loops should check it
    pub cancellation_token: CancellationToken,
}

impl ToolContext {
    /// Create a new tool context
    pub fn new(
        run_id: impl Into<String>,
        call_id: impl Into<String>,
        store: Arc<DatasetStore>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            call_id: call_id.into(),
            store,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Create a new tool context with a specific cancellation token
    pub fn with_cancellation_token(
        run_id: impl Into<String>,
        call_id: impl Into<String>,
        store: Arc<DatasetStore>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            call_id: call_id.into(),
            store,
            cancellation_token,
        }
    }

    /// Check if the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("run_id", &self.run_id)
            .field("call_id", &self.call_id)
            .finish_non_exhaustive()
    }
}
