use std::path::Path;

use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, ScanFilter, SearchResult};

/// Persistent ordered mapping from chunk identity to vector plus metadata.
///
/// Chunk content and metadata travel together as [`Chunk`] values; the
/// vector at index `i` belongs to the chunk at index `i`. Implementations
/// must tolerate empty input batches (no-op) and must not create a table
/// until at least one row exists.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append rows. Inputs above the store's safe batch ceiling are split
    /// into smaller batches iteratively, never recursively.
    async fn insert_batch(
        &self,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<(), DomainError>;

    /// Atomically replace all chunks stored for `path`.
    async fn update_file(
        &self,
        path: &str,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<(), DomainError>;

    /// Remove all chunks for `path`. Succeeds silently when none exist.
    async fn delete_by_file(&self, path: &str) -> Result<(), DomainError>;

    /// Range scan with language and case-insensitive path-pattern filters.
    async fn scan_with_filter(&self, filter: &ScanFilter) -> Result<Vec<Chunk>, DomainError>;

    /// Nearest-neighbor search over stored vectors.
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;

    /// On-disk root for companion artefacts; the manifest lives here.
    fn db_path(&self) -> &Path;
}
