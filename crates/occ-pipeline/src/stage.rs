use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::error::Result;

/// Priorities from §4.J (lower runs first). Stages are driven in this order
/// by `OrchestrationPipeline::run_turn`; the constants exist so each stage's
/// declared position is visible and checkable independent of call-site order.
pub mod priority {
    pub const SESSION_LOAD: u32 = 10;
    pub const PROMPT_ROUTING: u32 = 20;
    pub const RETRIEVAL: u32 = 30;
    pub const BUDGET: u32 = 40;
    pub const MESSAGE_PREPARATION: u32 = 45;
    pub const COMPLETION: u32 = 50;
    pub const TOOL_EXECUTION: u32 = 60;
    pub const PERSISTENCE: u32 = 70;
    pub const USAGE_RECORD: u32 = 80;
}

/// One step of the orchestration pipeline (§4.J). Each stage is idempotent
/// given its inputs; `rollback` is invoked only when the turn aborts after
/// this stage already committed an observable side effect (e.g. a persisted
/// message), and is a no-op for any stage that commits nothing durable.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> u32;

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()>;

    async fn rollback(&self, _ctx: &mut PipelineContext) {}
}
