use crate::domain::{Chunk, Language};

/// Transforms one file into its ordered chunk sequence. Implementations
/// dispatch on language (AST chunker, template chunker, line fallback) and
/// must never fail: unparseable content degrades to line-based chunks.
pub trait ChunkerService: Send + Sync {
    fn chunk_file(&self, path: &str, content: &str, language: Language) -> Vec<Chunk>;
}
