use crate::application::ChunkerService;
use crate::domain::{Chunk, Language};

use super::chunker::{Chunker, ChunkerOptions, TenantTags};
use super::template::TemplateChunker;

/// Language-dispatched [`ChunkerService`]: markup-embedded languages route
/// to the template chunker, everything else to the AST chunker with its
/// line-based fallback.
pub struct TreeSitterChunker {
    code: Chunker,
    template: TemplateChunker,
}

impl TreeSitterChunker {
    pub fn new(options: ChunkerOptions, tags: TenantTags) -> Self {
        Self {
            code: Chunker::new(options, tags.clone()),
            template: TemplateChunker::new(options, tags),
        }
    }
}

impl Default for TreeSitterChunker {
    fn default() -> Self {
        Self::new(ChunkerOptions::default(), TenantTags::default())
    }
}

impl ChunkerService for TreeSitterChunker {
    fn chunk_file(&self, path: &str, content: &str, language: Language) -> Vec<Chunk> {
        if language.is_template() {
            self.template.chunk_file(path, content, language)
        } else {
            self.code.chunk_file(path, content, language)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkType;

    #[test]
    fn test_dispatch_by_language() {
        let chunker = TreeSitterChunker::default();

        let code = chunker.chunk_file(
            "math.ts",
            "export function f() { return 1; }\n",
            Language::TypeScript,
        );
        assert!(code.iter().any(|c| c.chunk_type() == ChunkType::Function));

        let template = chunker.chunk_file(
            "hero.liquid",
            "{% schema %}\n{ \"name\": \"Hero\" }\n{% endschema %}\n",
            Language::Liquid,
        );
        assert!(template.iter().all(|c| c.chunk_type() == ChunkType::Template));
    }
}
