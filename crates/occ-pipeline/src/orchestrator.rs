use std::sync::Arc;

use occ_core::types::Message;
use tracing::{instrument, warn};

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::stage::Stage;

/// Drives one turn through the full stage sequence (§4.J): an explicit
/// stage list plus a tool-calling loop that re-enters message preparation /
/// completion / tool execution until the model stops asking for tools or a
/// limit bites.
///
/// Every stage boundary is also a cancellation checkpoint: a caller
/// cancelling `ctx.cancellation` mid-turn stops the loop before the next
/// stage runs rather than after the whole turn completes.
pub struct OrchestrationPipeline {
    session_load: Arc<dyn Stage>,
    prompt_routing: Arc<dyn Stage>,
    retrieval: Arc<dyn Stage>,
    budget: Arc<dyn Stage>,
    message_preparation: Arc<dyn Stage>,
    completion: Arc<dyn Stage>,
    tool_execution: Arc<dyn Stage>,
    persistence: Arc<dyn Stage>,
    usage_record: Arc<dyn Stage>,
}

impl OrchestrationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_load: Arc<dyn Stage>,
        prompt_routing: Arc<dyn Stage>,
        retrieval: Arc<dyn Stage>,
        budget: Arc<dyn Stage>,
        message_preparation: Arc<dyn Stage>,
        completion: Arc<dyn Stage>,
        tool_execution: Arc<dyn Stage>,
        persistence: Arc<dyn Stage>,
        usage_record: Arc<dyn Stage>,
    ) -> Self {
        Self {
            session_load,
            prompt_routing,
            retrieval,
            budget,
            message_preparation,
            completion,
            tool_execution,
            persistence,
            usage_record,
        }
    }

    /// Runs one turn to completion and returns the terminating assistant
    /// message. On cancellation or error after a stage has already
    /// persisted something, the already-persisted stages are rolled back in
    /// reverse order before the error/cancellation is surfaced (§4.J
    /// "rollback(ctx)", §9 cancellation invariant: "partial state is not
    /// persisted except for any already-persisted user message").
    #[instrument(skip(self, ctx), fields(session_id = %ctx.session_id, user_id = %ctx.user_id))]
    pub async fn run_turn(&self, ctx: &mut PipelineContext) -> Result<Message> {
        let mut entered: Vec<&Arc<dyn Stage>> = Vec::new();

        let setup: [&Arc<dyn Stage>; 4] = [&self.session_load, &self.prompt_routing, &self.retrieval, &self.budget];
        for stage in setup {
            if let Err(e) = self.run_stage(stage, ctx, &mut entered).await {
                self.rollback_all(&entered, ctx).await;
                return Err(e);
            }
        }

        loop {
            if ctx.is_cancelled() {
                self.rollback_all(&entered, ctx).await;
                return Err(PipelineError::Cancelled);
            }
            if ctx.overall_timeout_elapsed() {
                self.rollback_all(&entered, ctx).await;
                return Err(PipelineError::TurnTimeout);
            }

            if let Err(e) = self.run_stage(&self.message_preparation, ctx, &mut entered).await {
                self.rollback_all(&entered, ctx).await;
                return Err(e);
            }
            if let Err(e) = self.run_stage(&self.completion, ctx, &mut entered).await {
                self.rollback_all(&entered, ctx).await;
                return Err(e);
            }

            let has_tool_calls = ctx.final_assistant.as_ref().is_some_and(|m| !m.tool_calls.is_empty());
            if !has_tool_calls {
                break;
            }

            if ctx.tool_calls_executed >= ctx.limits.max_tool_calls_per_turn || ctx.tool_round >= ctx.limits.max_tool_rounds {
                warn!(
                    tool_calls_executed = ctx.tool_calls_executed,
                    tool_round = ctx.tool_round,
                    "tool-calling loop hit its cap; finishing with an apology message instead of another round"
                );
                ctx.techniques.push("cap:max_tool_rounds".to_string());
                ctx.final_assistant = Some(capped_reply(ctx));
                break;
            }

            if let Err(e) = self.run_stage(&self.tool_execution, ctx, &mut entered).await {
                self.rollback_all(&entered, ctx).await;
                return Err(e);
            }
        }

        if let Err(e) = self.run_stage(&self.persistence, ctx, &mut entered).await {
            self.rollback_all(&entered, ctx).await;
            return Err(e);
        }

        // Usage recording is best-effort and commits nothing the turn
        // depends on; a failure here never unwinds an otherwise-successful
        // turn.
        let _ = self.usage_record.execute(ctx).await;

        ctx.final_assistant.clone().ok_or(PipelineError::Core(occ_core::OrchestrationError::Internal(
            "pipeline completed with no terminating assistant message".to_string(),
        )))
    }

    async fn run_stage<'a>(&self, stage: &'a Arc<dyn Stage>, ctx: &mut PipelineContext, entered: &mut Vec<&'a Arc<dyn Stage>>) -> Result<()> {
        stage.execute(ctx).await?;
        entered.push(stage);
        Ok(())
    }

    async fn rollback_all(&self, entered: &[&Arc<dyn Stage>], ctx: &mut PipelineContext) {
        for stage in entered.iter().rev() {
            stage.rollback(ctx).await;
        }
    }
}

/// Synthesizes the final-turn message returned when a cap is hit mid-round,
/// rather than letting the loop run forever or surfacing a raw error to the
/// caller (§4.J "Limits").
fn capped_reply(ctx: &PipelineContext) -> Message {
    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let content = format!(
        "I've reached the limit of {} tool calls across {} rounds for this turn without finishing. \
         Here's what I found so far — ask me to continue and I'll pick up where I left off.",
        ctx.limits.max_tool_calls_per_turn, ctx.limits.max_tool_rounds
    );
    Message::assistant_text(&ctx.session_id, id, content, now)
}
