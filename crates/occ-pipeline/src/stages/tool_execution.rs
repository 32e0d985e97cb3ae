use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use occ_sessions::SessionManager;
use occ_tools::{InvocationContext, ToolRegistry};

use crate::context::PipelineContext;
use crate::error::Result;
use crate::events::PipelineEvent;
use crate::stage::{priority, Stage};

/// Runs every tool call from the most recent assistant turn concurrently,
/// appends their responses, and persists the whole round immediately
/// (§4.J priority 60, §5 "tool calls within a single round run in
/// parallel"). Only entered when `ctx.final_assistant` carries `tool_calls`
/// — the orchestrator checks this before re-entering the stage list.
pub struct ToolExecutionStage {
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionManager>,
    working_dir: std::path::PathBuf,
}

impl ToolExecutionStage {
    pub fn new(tools: Arc<ToolRegistry>, sessions: Arc<SessionManager>, working_dir: impl Into<std::path::PathBuf>) -> Self {
        Self { tools, sessions, working_dir: working_dir.into() }
    }
}

#[async_trait]
impl Stage for ToolExecutionStage {
    fn name(&self) -> &'static str {
        "tool-execution"
    }

    fn priority(&self) -> u32 {
        priority::TOOL_EXECUTION
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let Some(assistant) = ctx.final_assistant.clone() else {
            return Ok(());
        };
        if assistant.tool_calls.is_empty() {
            return Ok(());
        }

        ctx.tool_calls_executed += assistant.tool_calls.len() as u32;
        self.sessions.append_message(&assistant)?;
        ctx.persisted_message_ids.push(assistant.id.clone());
        ctx.events.emit(PipelineEvent::MessagePersisted { message_id: assistant.id.clone(), role: "assistant" });

        let invocation_ctx = InvocationContext::new(self.working_dir.clone(), ctx.user_id.clone(), ctx.limits.per_tool_timeout)
            .with_cancellation(ctx.cancellation.clone());
        let events = ctx.events.clone();

        let futures = assistant.tool_calls.iter().map(|call| {
            let registry = Arc::clone(&self.tools);
            let invocation_ctx = invocation_ctx.clone();
            let call = call.clone();
            events.emit(PipelineEvent::ToolCallStarted { id: call.id.clone(), name: call.name.clone() });
            async move {
                let output = tokio::time::timeout(invocation_ctx.timeout, registry.execute(&call.name, call.arguments.clone(), &invocation_ctx))
                    .await
                    .unwrap_or_else(|_| occ_tools::ToolOutput::error(format!("tool '{}' exceeded its per-call timeout", call.name)));
                (call, output)
            }
        });

        let results = join_all(futures).await;

        let now = chrono::Utc::now().to_rfc3339();
        for (call, output) in results {
            ctx.events.emit(PipelineEvent::ToolCallCompleted { id: call.id.clone(), name: call.name.clone(), is_error: output.is_error });

            let response_id = uuid::Uuid::now_v7().to_string();
            let response = occ_core::types::Message::tool_response(&ctx.session_id, response_id.clone(), call.id.clone(), output.content, now.clone());
            self.sessions.append_message(&response)?;
            ctx.persisted_message_ids.push(response_id.clone());
            ctx.events.emit(PipelineEvent::MessagePersisted { message_id: response_id, role: "tool" });
            ctx.history.push(response);
        }

        ctx.history.push(assistant);
        ctx.tool_round += 1;
        ctx.techniques.push("tool_round".to_string());
        ctx.force_final_completion = true;
        Ok(())
    }

    /// The round this stage just persisted is a complete, independently
    /// valid exchange (every call answered) — it is not rolled back even if
    /// a later round or stage aborts. Only the orchestrator's final
    /// persistence stage rolls back its own commit.
    async fn rollback(&self, _ctx: &mut PipelineContext) {}
}
