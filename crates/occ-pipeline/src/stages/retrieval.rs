use std::sync::Arc;

use async_trait::async_trait;
use occ_memory::{MemoryFilters, MemoryManager};
use occ_retrieval::{RetrievalOrchestrator, SearchOptions};

use crate::context::PipelineContext;
use crate::error::Result;
use crate::stage::{priority, Stage};

const MEMORY_LIMIT: usize = 20;

/// Fuses vector search and tiered memory lookup for the current turn's query
/// (§4.J priority 30, §4.D, §4.F). Read-only.
pub struct RetrievalStage {
    retrieval: Arc<RetrievalOrchestrator>,
    memory: Arc<MemoryManager>,
}

impl RetrievalStage {
    pub fn new(retrieval: Arc<RetrievalOrchestrator>, memory: Arc<MemoryManager>) -> Self {
        Self { retrieval, memory }
    }
}

#[async_trait]
impl Stage for RetrievalStage {
    fn name(&self) -> &'static str {
        "retrieval"
    }

    fn priority(&self) -> u32 {
        priority::RETRIEVAL
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let query = &ctx.current_turn.content;
        ctx.retrieved = self
            .retrieval
            .search(query, &ctx.user_id, &SearchOptions::default())
            .await?;
        ctx.injected_sources = ctx.retrieved.iter().map(|r| r.source.clone()).collect();
        ctx.memories = self.memory.search(&ctx.user_id, query, &MemoryFilters::default(), MEMORY_LIMIT)?;
        Ok(())
    }
}
