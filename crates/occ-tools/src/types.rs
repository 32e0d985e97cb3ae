use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Schema + identity of one registered tool (§3 `Tool Definition`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Result of `Execute` (§4.H). Execution failures are converted into
/// `is_error=true` here rather than propagated as transport errors, so the
/// model loop can observe and react to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false, metadata: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: message.into(), is_error: true, metadata: None }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Per-invocation context passed to every tool execution (§4.H).
///
/// Implementations must observe `cancellation` and return promptly when it
/// fires — the pipeline's per-tool timeout (§4.J) and overall turn timeout
/// both signal through this token rather than aborting the future externally.
#[derive(Clone)]
pub struct InvocationContext {
    pub working_dir: std::path::PathBuf,
    pub cancellation: CancellationToken,
    pub caller_user_id: String,
    pub timeout: Duration,
}

impl InvocationContext {
    pub fn new(working_dir: impl Into<std::path::PathBuf>, caller_user_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            working_dir: working_dir.into(),
            cancellation: CancellationToken::new(),
            caller_user_id: caller_user_id.into(),
            timeout,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
