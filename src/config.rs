use serde::{Deserialize, Serialize};

use crate::domain::RelevanceThresholds;

/// Configuration consumed by the engine. Loading and migration of the
/// on-disk config file belong to the caller; this struct only defines the
/// recognized options and their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub core: CoreSection,
    pub chunking: ChunkingSection,
    pub complexity: ComplexitySection,
    pub storage: StorageSection,
    pub indexing: IndexingSection,
    pub relevance: RelevanceThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSection {
    /// Target chunk size in lines.
    pub chunk_size: usize,
    /// Lines of overlap between successive line-based chunks.
    pub chunk_overlap: usize,
    /// File-level fan-out during the initial full index (clamped to 1–16).
    pub concurrency: usize,
    /// Outer embedding batch size.
    pub embedding_batch_size: usize,
}

impl Default for CoreSection {
    fn default() -> Self {
        Self {
            chunk_size: 75,
            chunk_overlap: 10,
            concurrency: 4,
            embedding_batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AstFallback {
    LineBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    pub use_ast: bool,
    pub ast_fallback: AstFallback,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            use_ast: true,
            ast_fallback: AstFallback::LineBased,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexitySection {
    pub thresholds: ComplexityThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityThresholds {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub halstead_effort: f64,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            cyclomatic: 10,
            cognitive: 15,
            halstead_effort: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Tenant tags written into every chunk. When unset, `repo_id` is
    /// derived from the workspace root.
    pub repo_id: Option<String>,
    pub org_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSection {
    /// Legacy include globs: unknown-extension files matching one of these
    /// are still indexed.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Config {
    /// Fan-out bounded to the supported 1–16 range.
    pub fn concurrency(&self) -> usize {
        self.core.concurrency.clamp(1, 16)
    }
}
