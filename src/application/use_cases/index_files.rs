use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::{ChunkerService, EmbeddingClient, VectorStore};
use crate::domain::{
    compute_content_hash, mtime_ms, ChangeSet, DomainError, Language, Manifest, ManifestEntry,
    VcsState, HASH_ALGORITHM,
};

/// Embedding requests are capped at this many texts per call; the indexer
/// yields to the scheduler between micro-batches.
pub const EMBED_MICRO_BATCH: usize = 16;

const EMBED_TIMEOUT: Duration = Duration::from_secs(60);
const STORE_TIMEOUT: Duration = Duration::from_secs(60);

/// Top-level indexing result. Per-file failures never propagate; they are
/// counted by error category instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexSummary {
    pub files_indexed: u64,
    pub chunks_created: u64,
    pub files_deleted: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Skipped-file counts grouped by error category.
    pub skipped: BTreeMap<&'static str, u32>,
}

impl IndexSummary {
    pub fn skipped_total(&self) -> u32 {
        self.skipped.values().sum()
    }
}

enum FileOutcome {
    Indexed {
        chunk_count: u32,
        mtime: u64,
        content_hash: String,
    },
    /// Chunkless files stay tracked with a zero count.
    EmptyTracked { mtime: u64, content_hash: String },
    Deleted,
}

/// Orchestrates chunker, embedding client, vector store, and manifest for
/// one or many files. Per-file updates are atomic from the store's
/// perspective; manifest writes are buffered and flushed once per batch.
pub struct IncrementalIndexer {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    chunker: Arc<dyn ChunkerService>,
    concurrency: usize,
    embedding_batch_size: usize,
    cancellation: CancellationToken,
}

impl IncrementalIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        chunker: Arc<dyn ChunkerService>,
    ) -> Self {
        Self {
            store,
            embeddings,
            chunker,
            concurrency: 4,
            embedding_batch_size: 50,
            cancellation: CancellationToken::new(),
        }
    }

    /// File-level fan-out for the initial full index (clamped to 1–16).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 16);
        self
    }

    /// Outer embedding batch size; micro-batches subdivide it.
    pub fn with_embedding_batch_size(mut self, size: usize) -> Self {
        self.embedding_batch_size = size.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Index a set of files sequentially, in input order.
    pub async fn index_files(
        &self,
        root: &Path,
        paths: &[String],
        vcs_state: Option<VcsState>,
    ) -> IndexSummary {
        self.run(root, paths, false, vcs_state).await
    }

    /// Apply a change set: added and modified files are re-indexed,
    /// deleted files are dropped from the store and the manifest.
    pub async fn apply_changes(
        &self,
        root: &Path,
        changes: &ChangeSet,
        vcs_state: Option<VcsState>,
    ) -> IndexSummary {
        let paths: Vec<String> = changes
            .to_index()
            .chain(changes.deleted.iter())
            .cloned()
            .collect();
        self.run(root, &paths, false, vcs_state).await
    }

    /// Initial full index with bounded file-level parallelism. Per-file
    /// operations stay sequential; the store contract is
    /// single-writer-per-file.
    pub async fn full_index(
        &self,
        root: &Path,
        paths: &[String],
        vcs_state: Option<VcsState>,
    ) -> IndexSummary {
        self.run(root, paths, true, vcs_state).await
    }

    async fn run(
        &self,
        root: &Path,
        paths: &[String],
        parallel: bool,
        vcs_state: Option<VcsState>,
    ) -> IndexSummary {
        let start_time = Instant::now();
        let mut summary = IndexSummary::default();

        let db_path = self.store.db_path().to_path_buf();
        let mut manifest = match Manifest::load(&db_path).await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => Manifest::new(),
            Err(e) => {
                warn!("Manifest unreadable, starting fresh: {}", e);
                Manifest::new()
            }
        };

        let progress_bar = ProgressBar::new(paths.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                .expect("Invalid progress bar template")
                .progress_chars("━━─"),
        );

        let outcomes: Vec<(String, Result<FileOutcome, DomainError>)> = if parallel {
            stream::iter(paths.iter().cloned())
                .map(|path| {
                    let progress = progress_bar.clone();
                    async move {
                        progress.set_message(path.clone());
                        let outcome = self.process_file(root, &path).await;
                        progress.inc(1);
                        (path, outcome)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await
        } else {
            let mut collected = Vec::with_capacity(paths.len());
            for path in paths {
                progress_bar.set_message(path.clone());
                let outcome = self.process_file(root, path).await;
                progress_bar.inc(1);
                let cancelled = matches!(&outcome, Err(e) if e.is_cancelled());
                collected.push((path.clone(), outcome));
                if cancelled {
                    break;
                }
            }
            collected
        };

        progress_bar.finish_and_clear();

        for (path, outcome) in outcomes {
            match outcome {
                Ok(FileOutcome::Indexed {
                    chunk_count,
                    mtime,
                    content_hash,
                }) => {
                    summary.files_indexed += 1;
                    summary.chunks_created += chunk_count as u64;
                    manifest.upsert(
                        path,
                        ManifestEntry {
                            last_modified: mtime,
                            chunk_count,
                            content_hash: Some(content_hash),
                            hash_algorithm: Some(HASH_ALGORITHM.to_string()),
                        },
                    );
                }
                Ok(FileOutcome::EmptyTracked { mtime, content_hash }) => {
                    summary.files_indexed += 1;
                    manifest.upsert(
                        path,
                        ManifestEntry {
                            last_modified: mtime,
                            chunk_count: 0,
                            content_hash: Some(content_hash),
                            hash_algorithm: Some(HASH_ALGORITHM.to_string()),
                        },
                    );
                }
                Ok(FileOutcome::Deleted) => {
                    summary.files_deleted += 1;
                    manifest.remove(&path);
                }
                Err(e) if e.is_cancelled() => {
                    // Files whose update completed before cancellation keep
                    // their manifest entries; this one is simply not recorded.
                    summary.error = Some(e.to_string());
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path, e);
                    *summary.skipped.entry(e.category()).or_default() += 1;
                }
            }
        }

        manifest.set_vcs_state(vcs_state);
        if let Err(e) = manifest.save(&db_path).await {
            warn!("Manifest flush failed: {}", e);
            summary.error.get_or_insert_with(|| e.to_string());
        }

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Indexed {} files ({} chunks, {} deleted, {} skipped) in {}ms",
            summary.files_indexed,
            summary.chunks_created,
            summary.files_deleted,
            summary.skipped_total(),
            summary.duration_ms
        );
        summary
    }

    async fn process_file(&self, root: &Path, path: &str) -> Result<FileOutcome, DomainError> {
        self.check_cancelled()?;

        let absolute = root.join(path);
        if !absolute.exists() {
            self.store_call(self.store.delete_by_file(path)).await?;
            debug!("Removed deleted file {}", path);
            return Ok(FileOutcome::Deleted);
        }

        let content = tokio::fs::read_to_string(&absolute).await?;
        self.check_cancelled()?;

        let language = Language::from_path(&absolute);
        let chunks = self.chunker.chunk_file(path, &content, language);
        let mtime = mtime_ms(&absolute);
        let content_hash = compute_content_hash(content.as_bytes());

        if chunks.is_empty() {
            self.store_call(self.store.delete_by_file(path)).await?;
            return Ok(FileOutcome::EmptyTracked { mtime, content_hash });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content().to_string()).collect();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for outer_batch in texts.chunks(self.embedding_batch_size.max(EMBED_MICRO_BATCH)) {
            for micro_batch in outer_batch.chunks(EMBED_MICRO_BATCH) {
                self.check_cancelled()?;
                let batch_vectors =
                    tokio::time::timeout(EMBED_TIMEOUT, self.embeddings.embed_batch(micro_batch))
                        .await
                        .map_err(|_| DomainError::timeout("Embedding micro-batch timed out"))??;
                if batch_vectors.len() != micro_batch.len() {
                    return Err(DomainError::embedding(format!(
                        "Expected {} vectors, got {}",
                        micro_batch.len(),
                        batch_vectors.len()
                    )));
                }
                vectors.extend(batch_vectors);
                // Keep concurrent tasks from starving between micro-batches.
                tokio::task::yield_now().await;
            }
        }

        self.check_cancelled()?;
        let chunk_count = chunks.len() as u32;
        self.store_call(self.store.update_file(path, vectors, chunks))
            .await?;

        debug!("Indexed {} chunks from {}", chunk_count, path);
        Ok(FileOutcome::Indexed {
            chunk_count,
            mtime,
            content_hash,
        })
    }

    async fn store_call<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        tokio::time::timeout(STORE_TIMEOUT, call)
            .await
            .map_err(|_| DomainError::timeout("Vector store call timed out"))?
    }

    fn check_cancelled(&self) -> Result<(), DomainError> {
        if self.cancellation.is_cancelled() {
            Err(DomainError::cancelled("Indexing cancelled"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::connector::{InMemoryVectorStore, TreeSitterChunker};

    /// Records every batch size it is asked for.
    struct RecordingEmbedding {
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl RecordingEmbedding {
        fn new() -> Self {
            Self {
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for RecordingEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
            self.batch_sizes.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn indexer_with(
        store: Arc<InMemoryVectorStore>,
        embeddings: Arc<RecordingEmbedding>,
    ) -> IncrementalIndexer {
        IncrementalIndexer::new(store, embeddings, Arc::new(TreeSitterChunker::default()))
    }

    #[tokio::test]
    async fn test_embedding_micro_batches_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryVectorStore::new(dir.path().join(".lien")));
        let embeddings = Arc::new(RecordingEmbedding::new());

        // 50 single-line functions produce 50 chunks, forcing several
        // micro-batches.
        let content: String = (0..50)
            .map(|i| format!("export function f{}() {{ return {}; }}\n", i, i))
            .collect();
        std::fs::write(dir.path().join("many.ts"), &content).unwrap();

        let indexer = indexer_with(store.clone(), embeddings.clone());
        let summary = indexer
            .index_files(dir.path(), &["many.ts".to_string()], None)
            .await;

        assert!(summary.error.is_none());
        assert_eq!(summary.chunks_created, 50);

        let sizes = embeddings.batch_sizes.lock().unwrap().clone();
        assert!(sizes.len() >= 4);
        assert!(sizes.iter().all(|&s| s <= EMBED_MICRO_BATCH));
        assert_eq!(sizes.iter().sum::<usize>(), 50);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryVectorStore::new(dir.path().join(".lien")));
        let embeddings = Arc::new(RecordingEmbedding::new());
        std::fs::write(dir.path().join("a.ts"), "export const x = 1;\n").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let indexer =
            indexer_with(store.clone(), embeddings.clone()).with_cancellation(token);

        let summary = indexer
            .index_files(dir.path(), &["a.ts".to_string()], None)
            .await;

        assert!(summary.error.is_some());
        assert_eq!(summary.files_indexed, 0);
        assert_eq!(store.count().await.unwrap(), 0);
        let manifest = Manifest::load(store.db_path()).await.unwrap().unwrap();
        assert!(!manifest.contains("a.ts"));
    }

    #[tokio::test]
    async fn test_per_file_failure_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryVectorStore::new(dir.path().join(".lien")));
        let embeddings = Arc::new(RecordingEmbedding::new());
        std::fs::write(dir.path().join("ok.ts"), "export const x = 1;\n").unwrap();
        // Non-UTF8 content fails the read and is skipped with a category.
        std::fs::write(dir.path().join("bad.ts"), [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let indexer = indexer_with(store.clone(), embeddings);
        let summary = indexer
            .index_files(
                dir.path(),
                &["bad.ts".to_string(), "ok.ts".to_string()],
                None,
            )
            .await;

        assert!(summary.error.is_none());
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.skipped.get("io"), Some(&1));

        let manifest = Manifest::load(store.db_path()).await.unwrap().unwrap();
        assert!(manifest.contains("ok.ts"));
        assert!(!manifest.contains("bad.ts"));
    }
}
