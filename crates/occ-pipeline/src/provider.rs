use async_trait::async_trait;

use crate::error::Result;
use crate::events::{PipelineEvent, PipelineEvents};
use crate::types::{CompletionRequest, CompletionResult};

/// Abstraction over the upstream model call made by the completion stage
/// (§4.J), shaped by this pipeline's own message/tool types so no upstream
/// wire format leaks past this boundary.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult>;

    /// Streaming variant used by the completion stage when the turn has a
    /// live subscriber (§4.K `delta` events). The default forwards the
    /// provider's own batch result as a single delta; a provider backed by
    /// a real streaming endpoint overrides this to emit one
    /// `PipelineEvent::Delta` per incoming chunk instead.
    async fn complete_streaming(&self, request: CompletionRequest, events: &PipelineEvents) -> Result<CompletionResult> {
        let result = self.complete(request).await?;
        if !result.content.is_empty() {
            events.emit(PipelineEvent::Delta { content: result.content.clone() });
        }
        Ok(result)
    }
}
