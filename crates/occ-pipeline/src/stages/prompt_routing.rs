use std::sync::Arc;

use async_trait::async_trait;
use occ_prompts::{PromptTemplateRouter, SelectionContext};

use crate::context::PipelineContext;
use crate::error::Result;
use crate::stage::{priority, Stage};

const CONTEXT_WINDOW: usize = 3;

/// Selects a system-prompt template for the current turn (§4.J priority 20,
/// §4.G). Commits nothing beyond the router's own cache.
pub struct PromptRoutingStage {
    router: Arc<PromptTemplateRouter>,
}

impl PromptRoutingStage {
    pub fn new(router: Arc<PromptTemplateRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Stage for PromptRoutingStage {
    fn name(&self) -> &'static str {
        "prompt-routing"
    }

    fn priority(&self) -> u32 {
        priority::PROMPT_ROUTING
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let recent_messages = ctx
            .history
            .iter()
            .rev()
            .take(CONTEXT_WINDOW)
            .map(|m| m.content.clone())
            .collect();
        let selection_ctx = SelectionContext { user_groups: ctx.user_groups.clone(), recent_messages };

        let template = self
            .router
            .select_template_for_query(&ctx.user_id, &ctx.current_turn.content, Some(&selection_ctx))
            .await?;
        ctx.system_prompt_tokens = occ_budget::estimate_chars(&template.content);
        ctx.selected_template = Some(template);
        Ok(())
    }
}
