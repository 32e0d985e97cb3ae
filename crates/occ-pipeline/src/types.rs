use std::time::Duration;

use occ_core::types::{Message, ToolCall};
use occ_tools::ToolDefinition;

/// Configurable maxima enforced by the tool-calling loop (§4.J "Limits").
#[derive(Debug, Clone, Copy)]
pub struct PipelineLimits {
    pub max_tool_calls_per_turn: u32,
    pub max_tool_rounds: u32,
    pub per_tool_timeout: Duration,
    pub overall_turn_timeout: Duration,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_tool_calls_per_turn: 20,
            max_tool_rounds: 5,
            per_tool_timeout: Duration::from_secs(30),
            overall_turn_timeout: Duration::from_secs(120),
        }
    }
}

/// What the completion stage asks the upstream model to do (§4.J).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// One assistant turn back from the model (§4.J "completion stage").
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl CompletionResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
