use async_trait::async_trait;
use occ_budget::{build_tiers, calculate_budget, optimize_budget, ModelConfig, TierRatios};

use crate::context::PipelineContext;
use crate::error::Result;
use crate::stage::{priority, Stage};

/// Computes the per-tier token budget for this turn (§4.J priority 40,
/// §4.E). Read-only against `ctx`; raises `BudgetExceeded` if even the
/// system prompt alone overflows the available window.
pub struct BudgetStage {
    model: ModelConfig,
    ratios: TierRatios,
}

impl BudgetStage {
    pub fn new(model: ModelConfig, ratios: TierRatios) -> Self {
        Self { model, ratios }
    }
}

#[async_trait]
impl Stage for BudgetStage {
    fn name(&self) -> &'static str {
        "budget"
    }

    fn priority(&self) -> u32 {
        priority::BUDGET
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let budget = calculate_budget(self.model, ctx.system_prompt_tokens, self.ratios)?;

        let pending_tokens: u32 = ctx.history.iter().map(occ_budget::estimate_message_tokens).sum::<u32>()
            + occ_budget::estimate_message_tokens(&ctx.current_turn);
        let budget = optimize_budget(budget, pending_tokens);

        // Tier assembly (§4.E "Tier assembly") decides which slice of
        // history and which memories are even eligible to reach message
        // preparation / the completion call, enforcing P3
        // (sum(tiers.used) + systemTokens <= budget.available).
        ctx.tiers = Some(build_tiers(budget, &ctx.history, &ctx.memories));
        ctx.budget = Some(budget);
        Ok(())
    }
}
