use std::sync::Arc;

use async_trait::async_trait;
use occ_audit::{AuditRecorder, TierCounts};

use crate::context::PipelineContext;
use crate::error::Result;
use crate::stage::{priority, Stage};

/// Writes the turn's usage record (§4.J priority 80, §4.M). Best-effort: a
/// recorder failure is logged inside `AuditRecorder` itself and never
/// surfaces as a pipeline error, so this stage has nothing to roll back.
pub struct UsageRecordStage {
    audit: Arc<AuditRecorder>,
}

impl UsageRecordStage {
    pub fn new(audit: Arc<AuditRecorder>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl Stage for UsageRecordStage {
    fn name(&self) -> &'static str {
        "usage-record"
    }

    fn priority(&self) -> u32 {
        priority::USAGE_RECORD
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let tier_counts = ctx
            .tiers
            .as_ref()
            .map(|t| TierCounts {
                tier1: t.tier1_messages.len() as u32,
                tier2: t.tier2_memories.len() as u32,
                tier3: t.tier3_memories.len() as u32,
            })
            .unwrap_or_default();

        let templates_applied = ctx.selected_template.iter().map(|t| t.id.clone()).collect();

        self.audit.record_usage_best_effort(
            &ctx.session_id,
            &ctx.user_id,
            templates_applied,
            ctx.techniques.clone(),
            tier_counts,
            ctx.injected_sources.clone(),
            ctx.tokens_in,
            ctx.tokens_out,
        );
        Ok(())
    }
}
