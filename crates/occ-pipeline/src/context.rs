use std::time::Instant;

use occ_core::types::Message;
use occ_memory::Memory;
use occ_prompts::Template;
use occ_retrieval::UnifiedResult;
use tokio_util::sync::CancellationToken;

use crate::events::PipelineEvents;
use crate::types::PipelineLimits;

/// Shared, mutable state threaded through every stage of one turn (§4.J:
/// "each consumes and extends a shared context object"), kept as an
/// explicit struct so stages stay decoupled from each other's internals.
pub struct PipelineContext {
    pub session_id: String,
    pub user_id: String,
    pub user_groups: Vec<String>,
    pub cancellation: CancellationToken,
    pub limits: PipelineLimits,
    pub started_at: Instant,

    pub history: Vec<Message>,
    pub current_turn: Message,
    pub force_final_completion: bool,

    pub selected_template: Option<Template>,
    pub retrieved: Vec<UnifiedResult>,
    pub memories: Vec<Memory>,
    pub system_prompt_tokens: u32,
    pub budget: Option<occ_budget::Budget>,
    pub tiers: Option<occ_budget::Tiers>,

    pub prepared_messages: Vec<Message>,
    pub tool_round: u32,
    /// Running count of tool calls executed so far this turn, checked
    /// against `limits.max_tool_calls_per_turn` (§4.J "Limits").
    pub tool_calls_executed: u32,
    /// Techniques applied this turn (e.g. `"tool_round"`, `"cap:max_tool_rounds"`),
    /// recorded verbatim into the usage record (§4.M, §3 `Usage Record`).
    pub techniques: Vec<String>,

    pub final_assistant: Option<Message>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub persisted_message_ids: Vec<String>,
    pub injected_sources: Vec<String>,
    pub events: PipelineEvents,
}

impl PipelineContext {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>, user_groups: Vec<String>, current_turn: Message, limits: PipelineLimits, cancellation: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            user_groups,
            cancellation,
            limits,
            started_at: Instant::now(),
            history: Vec::new(),
            current_turn,
            force_final_completion: false,
            selected_template: None,
            retrieved: Vec::new(),
            memories: Vec::new(),
            system_prompt_tokens: 0,
            budget: None,
            tiers: None,
            prepared_messages: Vec::new(),
            tool_round: 0,
            tool_calls_executed: 0,
            techniques: Vec::new(),
            final_assistant: None,
            tokens_in: 0,
            tokens_out: 0,
            persisted_message_ids: Vec::new(),
            injected_sources: Vec::new(),
            events: PipelineEvents::none(),
        }
    }

    /// Attaches an event sink so stages stream incremental progress to a
    /// subscribed caller (§4.K). Without this call, `ctx.events` is a no-op
    /// sink — the shape used by the non-streaming HTTP path and by tests.
    pub fn with_events(mut self, events: PipelineEvents) -> Self {
        self.events = events;
        self
    }

    pub fn overall_timeout_elapsed(&self) -> bool {
        self.started_at.elapsed() >= self.limits.overall_turn_timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
