use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::message_prep;
use crate::stage::{priority, Stage};

/// Produces the validated, deduplicated message array the completion stage
/// will send upstream (§4.J priority 45, §4.I). Re-entered with
/// `force_final_completion = true` after each tool-execution round.
pub struct MessagePreparationStage;

#[async_trait]
impl Stage for MessagePreparationStage {
    fn name(&self) -> &'static str {
        "message-preparation"
    }

    fn priority(&self) -> u32 {
        priority::MESSAGE_PREPARATION
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        // Tier 1 (§4.E) is the budgeted, newest-first-then-reversed slice of
        // history that fits the model window; fall back to the full history
        // only if the budget stage hasn't run yet (e.g. direct unit tests).
        let source: &[occ_core::types::Message] =
            ctx.tiers.as_ref().map(|t| t.tier1_messages.as_slice()).unwrap_or(&ctx.history);
        let current_turn = ctx.current_turn.clone();
        ctx.prepared_messages = message_prep::prepare(source, Some(&current_turn), ctx.force_final_completion);
        Ok(())
    }
}
