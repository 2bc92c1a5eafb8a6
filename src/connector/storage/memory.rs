use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::RegexBuilder;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorStore;
use crate::domain::{Chunk, DomainError, RelevanceThresholds, ScanFilter, SearchResult};

/// Largest batch inserted in one step; bigger inputs are split.
const MAX_BATCH_ROWS: usize = 1000;

struct StoredRow {
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Reference [`VectorStore`]: rows in memory, brute-force cosine search.
/// The `db_path` root exists so companion artefacts (the manifest) have a
/// home; rows themselves are not persisted.
pub struct InMemoryVectorStore {
    rows: Mutex<Vec<StoredRow>>,
    db_path: PathBuf,
    thresholds: RelevanceThresholds,
}

impl InMemoryVectorStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            db_path: db_path.into(),
            thresholds: RelevanceThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RelevanceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    fn check_lengths(vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<(), DomainError> {
        if vectors.len() != chunks.len() {
            return Err(DomainError::store(format!(
                "Vector/chunk length mismatch: {} vs {}",
                vectors.len(),
                chunks.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_batch(
        &self,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<(), DomainError> {
        Self::check_lengths(&vectors, &chunks)?;
        if chunks.is_empty() {
            return Ok(());
        }

        // Split oversized batches iteratively; stack depth must not depend
        // on input size.
        let mut rows = self.rows.lock().await;
        let mut pending: Vec<StoredRow> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| StoredRow { vector, chunk })
            .collect();
        while !pending.is_empty() {
            let take = pending.len().min(MAX_BATCH_ROWS);
            let batch: Vec<StoredRow> = pending.drain(..take).collect();
            debug!("Inserting batch of {} rows", batch.len());
            rows.extend(batch);
        }
        Ok(())
    }

    async fn update_file(
        &self,
        path: &str,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<(), DomainError> {
        Self::check_lengths(&vectors, &chunks)?;

        // Remove-then-append under one lock keeps the replace atomic from
        // any reader's perspective.
        let mut rows = self.rows.lock().await;
        rows.retain(|row| row.chunk.file() != path);
        rows.extend(
            vectors
                .into_iter()
                .zip(chunks)
                .map(|(vector, chunk)| StoredRow { vector, chunk }),
        );
        Ok(())
    }

    async fn delete_by_file(&self, path: &str) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| row.chunk.file() != path);
        debug!("Deleted {} rows for {}", before - rows.len(), path);
        Ok(())
    }

    async fn scan_with_filter(&self, filter: &ScanFilter) -> Result<Vec<Chunk>, DomainError> {
        let rows = self.rows.lock().await;

        // The pattern is a regex when it compiles, a plain substring
        // otherwise; both are case-insensitive.
        let regex = filter.pattern.as_deref().and_then(|p| {
            RegexBuilder::new(p).case_insensitive(true).build().ok()
        });
        let substring = filter
            .pattern
            .as_deref()
            .filter(|_| regex.is_none())
            .map(str::to_lowercase);

        let mut out = Vec::new();
        for row in rows.iter() {
            if let Some(language) = filter.language {
                if row.chunk.language() != language {
                    continue;
                }
            }
            if let Some(re) = &regex {
                if !re.is_match(row.chunk.file()) {
                    continue;
                }
            } else if let Some(needle) = &substring {
                if !row.chunk.file().to_lowercase().contains(needle) {
                    continue;
                }
            }
            out.push(row.chunk.clone());
            if let Some(limit) = filter.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let rows = self.rows.lock().await;

        let mut scored: Vec<(f32, &StoredRow)> = rows
            .iter()
            .map(|row| (cosine_similarity(query_vector, &row.vector), row))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, row)| SearchResult::new(row.chunk.clone(), score, &self.thresholds))
            .collect())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.rows.lock().await.len() as u64)
    }

    fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
