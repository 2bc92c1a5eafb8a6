use std::sync::Arc;

use tracing::debug;

use crate::application::{EmbeddingClient, VectorStore};
use crate::domain::{DomainError, SearchResult};

/// Semantic search: embed the query, ask the store for nearest neighbors.
pub struct SearchCodeUseCase {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
}

impl SearchCodeUseCase {
    pub fn new(store: Arc<dyn VectorStore>, embeddings: Arc<dyn EmbeddingClient>) -> Self {
        Self { store, embeddings }
    }

    pub async fn execute(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::invalid_input("Empty search query"));
        }

        let vectors = self.embeddings.embed_batch(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("Embedding client returned no vector"))?;

        let results = self.store.search(&query_vector, k.max(1)).await?;
        debug!("Search for {:?} returned {} results", query, results.len());
        Ok(results)
    }
}
