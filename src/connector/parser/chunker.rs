use tracing::debug;

use super::metrics::compute_metrics;
use super::symbols::{extract_file_graph, extract_symbol_details};
use super::traverser::Traverser;
use crate::domain::{Chunk, ChunkType, Language};

/// Chunking parameters, resolved from configuration by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerOptions {
    /// Target chunk size in lines.
    pub chunk_size: usize,
    /// Lines of overlap between successive line-based windows.
    pub chunk_overlap: usize,
    pub use_ast: bool,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            chunk_size: 75,
            chunk_overlap: 10,
            use_ast: true,
        }
    }
}

/// Tenant tags stamped on every chunk.
#[derive(Debug, Clone, Default)]
pub struct TenantTags {
    pub repo_id: Option<String>,
    pub org_id: Option<String>,
}

/// Transforms a file into an ordered sequence of semantic chunks.
///
/// Declarations found by the language traverser become `function`/`class`
/// chunks; oversized declarations and uncovered lines become `block`
/// windows. Files without a usable AST degrade to pure line windowing.
pub struct Chunker {
    options: ChunkerOptions,
    tags: TenantTags,
}

impl Chunker {
    pub fn new(options: ChunkerOptions, tags: TenantTags) -> Self {
        Self { options, tags }
    }

    pub fn chunk_file(&self, path: &str, content: &str, language: Language) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        if self.options.use_ast {
            if let Some(traverser) = Traverser::for_language(language) {
                match self.ast_chunks(&traverser, path, content, &lines, language) {
                    Ok(chunks) => return chunks,
                    Err(e) => {
                        debug!("AST chunking failed for {}: {}, falling back", path, e);
                    }
                }
            }
        }

        self.line_chunks(path, &lines, language, 1, lines.len() as u32, ChunkType::Block)
    }

    fn ast_chunks(
        &self,
        traverser: &Traverser,
        path: &str,
        content: &str,
        lines: &[&str],
        language: Language,
    ) -> Result<Vec<Chunk>, crate::domain::DomainError> {
        let tree = traverser.parse(content)?;
        let graph = extract_file_graph(language, &tree, content);
        let declarations = traverser.extract_declarations(&tree, content);

        if declarations.is_empty() {
            // Whole-file line windows, still carrying the import/export
            // surface so dependency analysis sees declaration-less files.
            debug!("No declarations in {}, windowing whole file", path);
            return Ok(self
                .line_chunks(path, lines, language, 1, lines.len() as u32, ChunkType::Block)
                .into_iter()
                .map(|c| self.finish(c, &graph))
                .collect());
        }
        let split_threshold = (3 * self.options.chunk_size.max(1)) as u32;
        let total_lines = lines.len() as u32;

        let mut chunks = Vec::new();
        let mut covered_until: u32 = 0;

        for declaration in &declarations {
            let start = declaration.start_line().min(total_lines);
            let end = declaration.end_line().min(total_lines);
            if start <= covered_until {
                // Overlapping declarations keep the first span only.
                continue;
            }

            // Lines between the previous declaration and this one.
            if start > covered_until + 1 {
                chunks.extend(self.line_chunks(
                    path,
                    lines,
                    language,
                    covered_until + 1,
                    start - 1,
                    ChunkType::Block,
                ));
            }

            let details = extract_symbol_details(declaration.node, content);
            let metrics = compute_metrics(declaration.node, content);
            let span = end - start + 1;

            if span <= split_threshold {
                let mut chunk = Chunk::new(
                    path.to_string(),
                    slice_lines(lines, start, end),
                    start,
                    end,
                    language,
                    declaration.symbol_type.chunk_type(),
                );
                if let Some(name) = &declaration.name {
                    chunk = chunk.with_symbol(name.clone(), declaration.symbol_type);
                }
                if let Some(parent) = &declaration.parent {
                    chunk = chunk.with_parent_class(parent.clone());
                }
                if let Some(parameters) = details.parameters {
                    chunk = chunk.with_parameters(parameters);
                }
                if let Some(signature) = details.signature {
                    chunk = chunk.with_signature(signature);
                }
                if let Some(return_type) = details.return_type {
                    chunk = chunk.with_return_type(return_type);
                }
                chunk = chunk
                    .with_call_sites(details.call_sites)
                    .with_complexity(metrics.cyclomatic, metrics.cognitive)
                    .with_halstead(metrics.halstead);
                chunks.push(self.finish(chunk, &graph));
            } else {
                // Oversized declaration: window it, each window keeping the
                // declaration's symbol identity.
                for (window_start, window_end) in
                    window_ranges(start, end, self.options.chunk_size, self.options.chunk_overlap)
                {
                    let mut chunk = Chunk::new(
                        path.to_string(),
                        slice_lines(lines, window_start, window_end),
                        window_start,
                        window_end,
                        language,
                        ChunkType::Block,
                    );
                    if let Some(name) = &declaration.name {
                        chunk = chunk.with_symbol(name.clone(), declaration.symbol_type);
                    }
                    if let Some(parent) = &declaration.parent {
                        chunk = chunk.with_parent_class(parent.clone());
                    }
                    chunk = chunk
                        .with_complexity(metrics.cyclomatic, metrics.cognitive)
                        .with_halstead(metrics.halstead);
                    chunks.push(self.finish(chunk, &graph));
                }
            }

            covered_until = covered_until.max(end);
        }

        if covered_until < total_lines {
            chunks.extend(self.line_chunks(
                path,
                lines,
                language,
                covered_until + 1,
                total_lines,
                ChunkType::Block,
            ));
        }

        // Attach the file graph to trailing block chunks too.
        let chunks = chunks
            .into_iter()
            .map(|c| self.finish(c, &graph))
            .collect::<Vec<_>>();

        let mut sorted = chunks;
        sorted.sort_by_key(|c| (c.start_line(), c.end_line()));
        Ok(sorted)
    }

    /// Pure line windowing over `[first, last]`, dropping whitespace-only
    /// windows.
    fn line_chunks(
        &self,
        path: &str,
        lines: &[&str],
        language: Language,
        first: u32,
        last: u32,
        chunk_type: ChunkType,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (start, end) in
            window_ranges(first, last, self.options.chunk_size, self.options.chunk_overlap)
        {
            let content = slice_lines(lines, start, end);
            if content.trim().is_empty() {
                continue;
            }
            let chunk = Chunk::new(path.to_string(), content, start, end, language, chunk_type)
                .with_tenant(self.tags.repo_id.clone(), self.tags.org_id.clone());
            chunks.push(chunk);
        }
        chunks
    }

    /// Stamp tenant tags and the file's import/export surface on a chunk.
    fn finish(&self, chunk: Chunk, graph: &super::symbols::FileGraph) -> Chunk {
        let already_tagged = chunk.imports().is_some()
            || chunk.exports().is_some()
            || chunk.imported_symbols().is_some();
        let mut chunk = chunk.with_tenant(self.tags.repo_id.clone(), self.tags.org_id.clone());
        if !already_tagged {
            chunk = chunk
                .with_imports(graph.imports.clone())
                .with_imported_symbols(graph.imported_symbols.clone())
                .with_exports(graph.exports.clone());
        }
        chunk
    }
}

/// Split `[first, last]` (1-based, inclusive) into windows of `size` lines
/// with `overlap` lines shared between consecutive windows.
pub(crate) fn window_ranges(
    first: u32,
    last: u32,
    size: usize,
    overlap: usize,
) -> Vec<(u32, u32)> {
    if first > last {
        return Vec::new();
    }
    let size = size.max(1) as u32;
    let overlap = (overlap as u32).min(size.saturating_sub(1));

    let mut ranges = Vec::new();
    let mut start = first;
    loop {
        let end = (start + size - 1).min(last);
        ranges.push((start, end));
        if end >= last {
            break;
        }
        start = end - overlap + 1;
    }
    ranges
}

pub(crate) fn slice_lines(lines: &[&str], start: u32, end: u32) -> String {
    let from = (start.saturating_sub(1)) as usize;
    let to = (end as usize).min(lines.len());
    lines[from..to].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SymbolType;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(
            ChunkerOptions {
                chunk_size: size,
                chunk_overlap: overlap,
                use_ast: true,
            },
            TenantTags::default(),
        )
    }

    #[test]
    fn test_window_ranges_overlap_invariant() {
        let ranges = window_ranges(1, 100, 20, 5);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].0, pair[0].1 - 5 + 1);
        }
        assert_eq!(ranges[0].0, 1);
        assert_eq!(ranges.last().unwrap().1, 100);
    }

    #[test]
    fn test_window_size_one() {
        let ranges = window_ranges(1, 3, 1, 10);
        assert_eq!(ranges, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_window_larger_than_content() {
        let ranges = window_ranges(1, 10, 11, 2);
        assert_eq!(ranges, vec![(1, 10)]);
    }

    #[test]
    fn test_small_function_is_one_chunk() {
        let source = "export function calculateSum(a, b) {\n  return a + b;\n}\n";
        let chunks = chunker(75, 10).chunk_file("math.ts", source, Language::TypeScript);

        let function_chunks: Vec<_> = chunks
            .iter()
            .filter(|c| c.chunk_type() == ChunkType::Function)
            .collect();
        assert_eq!(function_chunks.len(), 1);
        assert_eq!(function_chunks[0].symbol_name(), Some("calculateSum"));
        assert_eq!(function_chunks[0].symbol_type(), Some(SymbolType::Function));
    }

    #[test]
    fn test_chunk_content_matches_line_slice() {
        let source = "const a = 1;\nexport function f() {\n  return a;\n}\nconst b = 2;\n";
        let chunks = chunker(75, 10).chunk_file("f.ts", source, Language::TypeScript);
        let lines: Vec<&str> = source.lines().collect();

        for chunk in &chunks {
            let expected = slice_lines(&lines, chunk.start_line(), chunk.end_line());
            assert_eq!(chunk.content(), expected, "at {}", chunk.location());
            assert_eq!(
                chunk.content().lines().count() as u32,
                chunk.end_line() - chunk.start_line() + 1
            );
        }
    }

    #[test]
    fn test_chunks_sorted_and_non_overlapping() {
        let source = r#"
import { x } from './x';

export function first() {
  return x;
}

const gap = 1;

export function second() {
  return gap;
}
"#;
        let chunks = chunker(75, 10).chunk_file("mod.ts", source, Language::TypeScript);
        for pair in chunks.windows(2) {
            assert!(pair[0].start_line() <= pair[1].start_line());
            assert!(pair[0].end_line() < pair[1].start_line(), "overlap at {}", pair[1].location());
        }
    }

    #[test]
    fn test_oversized_declaration_is_windowed() {
        let mut body = String::from("export function big() {\n");
        for i in 0..40 {
            body.push_str(&format!("  console.log({});\n", i));
        }
        body.push_str("}\n");

        let chunks = chunker(5, 1).chunk_file("big.ts", &body, Language::TypeScript);
        let windows: Vec<_> = chunks
            .iter()
            .filter(|c| c.symbol_name() == Some("big"))
            .collect();
        assert!(windows.len() > 1);
        for window in &windows {
            assert_eq!(window.chunk_type(), ChunkType::Block);
            assert_eq!(window.symbol_type(), Some(SymbolType::Function));
        }
    }

    #[test]
    fn test_unsupported_language_falls_back_to_lines() {
        let source = "puts 'hello'\nputs 'world'\n";
        let chunks = chunker(75, 10).chunk_file("hello.rb", source, Language::Ruby);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Block);
    }

    #[test]
    fn test_whitespace_only_windows_dropped() {
        let source = "\n\n\n\n\n";
        let chunks = chunker(2, 0).chunk_file("empty.rb", source, Language::Ruby);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_empty_file_yields_no_chunks() {
        let chunks = chunker(75, 10).chunk_file("empty.ts", "", Language::TypeScript);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_line_fallback_consecutive_windows() {
        let source = (1..=30)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunker(10, 3).chunk_file("notes.rb", &source, Language::Ruby);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_line(), pair[0].end_line() - 3 + 1);
        }
    }

    #[test]
    fn test_tenant_tags_applied() {
        let tags = TenantTags {
            repo_id: Some("shop-12ab34cd".to_string()),
            org_id: Some("acme".to_string()),
        };
        let chunker = Chunker::new(ChunkerOptions::default(), tags);
        let chunks = chunker.chunk_file(
            "math.ts",
            "export function f() { return 1; }\n",
            Language::TypeScript,
        );
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].repo_id(), Some("shop-12ab34cd"));
        assert_eq!(chunks[0].org_id(), Some("acme"));
    }

    #[test]
    fn test_declarationless_file_keeps_import_metadata() {
        let source = "import { AuthService } from './auth';\nexport { AuthService };\n";
        let chunks = chunker(75, 10).chunk_file("src/index.ts", source, Language::TypeScript);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Block);
        assert!(chunks[0]
            .imports()
            .unwrap()
            .contains(&"./auth".to_string()));
        assert!(chunks[0]
            .exports()
            .unwrap()
            .contains(&"AuthService".to_string()));
        assert!(chunks[0].is_re_exporter());
    }

    #[test]
    fn test_re_index_is_deterministic() {
        let source = "export function stable() {\n  return 1;\n}\nconst pad = 2;\n";
        let first = chunker(75, 10).chunk_file("s.ts", source, Language::TypeScript);
        let second = chunker(75, 10).chunk_file("s.ts", source, Language::TypeScript);

        let keys = |chunks: &[Chunk]| {
            chunks
                .iter()
                .map(|c| (c.start_line(), c.end_line(), c.symbol_name().map(String::from)))
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&first), keys(&second));
    }
}
