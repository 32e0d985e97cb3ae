use std::sync::Arc;

use async_trait::async_trait;
use occ_core::types::TokenUsage;
use occ_tools::ToolRegistry;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::events::PipelineEvent;
use crate::provider::CompletionProvider;
use crate::stage::{priority, Stage};
use crate::types::CompletionRequest;

/// Calls the upstream model with the prepared messages plus the tool
/// catalogue (§4.J priority 50). Re-entered after each tool-execution round.
pub struct CompletionStage {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<ToolRegistry>,
}

impl CompletionStage {
    pub fn new(provider: Arc<dyn CompletionProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self { provider, tools }
    }
}

#[async_trait]
impl Stage for CompletionStage {
    fn name(&self) -> &'static str {
        "completion"
    }

    fn priority(&self) -> u32 {
        priority::COMPLETION
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let request = CompletionRequest { messages: ctx.prepared_messages.clone(), tools: self.tools.list() };
        let result = self.provider.complete_streaming(request, &ctx.events).await?;

        ctx.tokens_in += result.tokens_in;
        ctx.tokens_out += result.tokens_out;
        ctx.events.emit(PipelineEvent::Usage(TokenUsage { tokens_in: result.tokens_in, tokens_out: result.tokens_out }));

        let id = uuid::Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        ctx.final_assistant = Some(if result.has_tool_calls() {
            let mut message = occ_core::types::Message::assistant_tool_calls(&ctx.session_id, id, now, result.tool_calls.clone());
            message.content = result.content.clone();
            message
        } else {
            occ_core::types::Message::assistant_text(&ctx.session_id, id, result.content.clone(), now)
        });
        Ok(())
    }
}
