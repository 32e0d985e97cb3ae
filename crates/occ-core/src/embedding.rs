use async_trait::async_trait;

use crate::error::Result;

/// Turns text into a dense vector for semantic search (§4.B/§4.F/§4.G).
/// Retrieval, the prompt router, and memory consolidation all embed against
/// the same provider so that vectors land in a shared geometry.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
