use async_trait::async_trait;

use crate::domain::DomainError;

/// Maps text to fixed-dimension float vectors. Implementations must be
/// deterministic per input. The indexer feeds micro-batches and yields to
/// the scheduler between them.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    fn dimensions(&self) -> usize;
}
