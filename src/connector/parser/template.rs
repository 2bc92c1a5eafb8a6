use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::chunker::{slice_lines, window_ranges, ChunkerOptions, TenantTags};
use crate::domain::{Chunk, ChunkType, Language, SymbolType};

static COMMENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%-?\s*comment\s*-?%\}.*?\{%-?\s*endcomment\s*-?%\}")
        .expect("valid comment regex")
});

static INLINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%-?\s*#[^%]*-?%\}").expect("valid inline comment regex"));

static RENDER_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(?:render|include)\s+['"]([^'"]+)['"]"#).expect("valid render regex")
});

static SECTION_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*section\s+['"]([^'"]+)['"]"#).expect("valid section regex")
});

/// The special block kinds a markup template can embed.
const SPECIAL_BLOCKS: &[(&str, SymbolType)] = &[
    ("schema", SymbolType::Schema),
    ("style", SymbolType::Style),
    ("javascript", SymbolType::Javascript),
];

struct SpecialBlock {
    start_line: u32,
    end_line: u32,
    symbol_type: SymbolType,
    /// Block body with the surrounding tags stripped.
    body: String,
}

/// Chunker for markup files with embedded schema/style/script blocks.
///
/// Blocks are located by first-start/first-end scanning; nested special
/// tags are not supported, matching the host format. Comment stripping
/// likewise does not unwind nested comment blocks.
pub struct TemplateChunker {
    options: ChunkerOptions,
    tags: TenantTags,
}

impl TemplateChunker {
    pub fn new(options: ChunkerOptions, tags: TenantTags) -> Self {
        Self { options, tags }
    }

    pub fn chunk_file(&self, path: &str, content: &str, language: Language) -> Vec<Chunk> {
        match language {
            Language::Json => self.chunk_json_template(path, content),
            _ => self.chunk_markup(path, content, language),
        }
    }

    fn chunk_markup(&self, path: &str, content: &str, language: Language) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }
        let total_lines = lines.len() as u32;

        let mut blocks = find_special_blocks(content);
        blocks.sort_by_key(|b| b.start_line);

        let mut chunks = Vec::new();
        let mut covered_until: u32 = 0;

        for block in &blocks {
            if block.start_line <= covered_until {
                continue;
            }

            if block.start_line > covered_until + 1 {
                chunks.extend(self.markup_chunks(
                    path,
                    &lines,
                    language,
                    covered_until + 1,
                    block.start_line - 1,
                ));
            }

            chunks.extend(self.special_block_chunks(path, &lines, language, block));
            covered_until = covered_until.max(block.end_line);
        }

        if covered_until < total_lines {
            chunks.extend(self.markup_chunks(path, &lines, language, covered_until + 1, total_lines));
        }

        chunks.sort_by_key(|c| (c.start_line(), c.end_line()));
        chunks
    }

    fn special_block_chunks(
        &self,
        path: &str,
        lines: &[&str],
        language: Language,
        block: &SpecialBlock,
    ) -> Vec<Chunk> {
        let symbol_name = match block.symbol_type {
            SymbolType::Schema => schema_name(&block.body),
            _ => None,
        };

        let span = block.end_line - block.start_line + 1;
        let split_threshold = (3 * self.options.chunk_size.max(1)) as u32;

        let ranges = if span <= split_threshold {
            vec![(block.start_line, block.end_line)]
        } else {
            window_ranges(
                block.start_line,
                block.end_line,
                self.options.chunk_size,
                self.options.chunk_overlap,
            )
        };

        ranges
            .into_iter()
            .map(|(start, end)| {
                let content = slice_lines(lines, start, end);
                let imports = render_references(&content);
                let mut chunk = Chunk::new(
                    path.to_string(),
                    content,
                    start,
                    end,
                    language,
                    ChunkType::Template,
                );
                if let Some(name) = &symbol_name {
                    chunk = chunk.with_symbol(name.clone(), block.symbol_type);
                } else {
                    chunk = chunk.with_symbol(block.symbol_type.as_str(), block.symbol_type);
                }
                chunk
                    .with_imports(imports)
                    .with_tenant(self.tags.repo_id.clone(), self.tags.org_id.clone())
            })
            .collect()
    }

    /// Plain markup lines grouped into `template` windows; references to
    /// other templates become the window's imports.
    fn markup_chunks(
        &self,
        path: &str,
        lines: &[&str],
        language: Language,
        first: u32,
        last: u32,
    ) -> Vec<Chunk> {
        window_ranges(first, last, self.options.chunk_size, self.options.chunk_overlap)
            .into_iter()
            .filter_map(|(start, end)| {
                let content = slice_lines(lines, start, end);
                if content.trim().is_empty() {
                    return None;
                }
                let imports = render_references(&content);
                Some(
                    Chunk::new(
                        path.to_string(),
                        content,
                        start,
                        end,
                        language,
                        ChunkType::Template,
                    )
                    .with_imports(imports)
                    .with_tenant(self.tags.repo_id.clone(), self.tags.org_id.clone()),
                )
            })
            .collect()
    }

    /// JSON template: section types from the parsed `sections` object
    /// become imports on the leading chunk.
    fn chunk_json_template(&self, path: &str, content: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let section_types = json_section_types(content);

        let mut chunks: Vec<Chunk> = window_ranges(
            1,
            lines.len() as u32,
            self.options.chunk_size,
            self.options.chunk_overlap,
        )
        .into_iter()
        .filter_map(|(start, end)| {
            let content = slice_lines(&lines, start, end);
            if content.trim().is_empty() {
                return None;
            }
            Some(
                Chunk::new(
                    path.to_string(),
                    content,
                    start,
                    end,
                    Language::Json,
                    ChunkType::Template,
                )
                .with_tenant(self.tags.repo_id.clone(), self.tags.org_id.clone()),
            )
        })
        .collect();

        if let Some(first) = chunks.first_mut() {
            *first = first.clone().with_imports(section_types);
        }
        chunks
    }
}

/// Locate each special block by scanning for its first start tag and the
/// first matching end tag after it.
fn find_special_blocks(content: &str) -> Vec<SpecialBlock> {
    let mut blocks = Vec::new();
    for (tag, symbol_type) in SPECIAL_BLOCKS {
        let start_re = Regex::new(&format!(r"\{{%-?\s*{}\s*-?%\}}", tag)).expect("valid start tag");
        let end_re =
            Regex::new(&format!(r"\{{%-?\s*end{}\s*-?%\}}", tag)).expect("valid end tag");

        let Some(start_match) = start_re.find(content) else {
            continue;
        };
        let Some(end_match) = end_re.find_at(content, start_match.end()) else {
            debug!("Unterminated {{% {} %}} block", tag);
            continue;
        };

        let body = content[start_match.end()..end_match.start()].to_string();
        blocks.push(SpecialBlock {
            start_line: line_of_offset(content, start_match.start()),
            end_line: line_of_offset(content, end_match.end().saturating_sub(1)),
            symbol_type: *symbol_type,
            body,
        });
    }
    blocks
}

fn line_of_offset(content: &str, offset: usize) -> u32 {
    content[..offset.min(content.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count() as u32
        + 1
}

/// The `name` field of a schema block's JSON body.
fn schema_name(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    value.get("name")?.as_str().map(String::from)
}

/// Render/include/section references in comment-stripped content.
fn render_references(content: &str) -> Vec<String> {
    let stripped = COMMENT_BLOCK.replace_all(content, "");
    let stripped = INLINE_COMMENT.replace_all(&stripped, "");

    let mut refs = Vec::new();
    for capture in RENDER_REF.captures_iter(&stripped) {
        let target = capture[1].to_string();
        if !refs.contains(&target) {
            refs.push(target);
        }
    }
    for capture in SECTION_REF.captures_iter(&stripped) {
        let target = capture[1].to_string();
        if !refs.contains(&target) {
            refs.push(target);
        }
    }
    refs
}

/// Section types referenced by a JSON template.
fn json_section_types(content: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(sections) = value.get("sections").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut types = Vec::new();
    for section in sections.values() {
        if let Some(section_type) = section.get("type").and_then(Value::as_str) {
            let section_type = section_type.to_string();
            if !types.contains(&section_type) {
                types.push(section_type);
            }
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize) -> TemplateChunker {
        TemplateChunker::new(
            ChunkerOptions {
                chunk_size: size,
                chunk_overlap: 2,
                use_ast: true,
            },
            TenantTags::default(),
        )
    }

    #[test]
    fn test_schema_block_with_name() {
        let content = r#"<div class="hero">
{% schema %}
{ "name": "Hero", "settings": [] }
{% endschema %}
<p>after</p>
"#;
        let chunks = chunker(75).chunk_file("sections/hero.liquid", content, Language::Liquid);

        let schema: Vec<_> = chunks
            .iter()
            .filter(|c| c.symbol_type() == Some(SymbolType::Schema))
            .collect();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].symbol_name(), Some("Hero"));
        assert_eq!(schema[0].chunk_type(), ChunkType::Template);
        assert_eq!(schema[0].start_line(), 2);
        assert_eq!(schema[0].end_line(), 4);
    }

    #[test]
    fn test_render_references_become_imports() {
        let mut content = String::from("{% schema %}\n{ \"name\": \"Hero\" }\n{% endschema %}\n");
        for _ in 0..140 {
            content.push_str("<div>markup</div>\n");
        }
        content.push_str("{% render 'product-card' %}\n");
        for _ in 0..50 {
            content.push_str("<div>markup</div>\n");
        }

        let chunks = chunker(75).chunk_file("sections/grid.liquid", &content, Language::Liquid);

        let with_imports: Vec<_> = chunks
            .iter()
            .filter(|c| {
                c.imports()
                    .is_some_and(|i| i.contains(&"product-card".to_string()))
            })
            .collect();
        assert!(!with_imports.is_empty());
        assert!(with_imports
            .iter()
            .all(|c| c.chunk_type() == ChunkType::Template));

        // Markup split into multiple template chunks.
        let template_count = chunks
            .iter()
            .filter(|c| c.symbol_type().is_none())
            .count();
        assert!(template_count > 1);
    }

    #[test]
    fn test_commented_render_is_ignored() {
        let content = "{% comment %}{% render 'dead' %}{% endcomment %}\n{% render 'live' %}\n";
        let chunks = chunker(75).chunk_file("x.liquid", content, Language::Liquid);

        let imports: Vec<&str> = chunks
            .iter()
            .filter_map(|c| c.imports())
            .flatten()
            .map(String::as_str)
            .collect();
        assert!(imports.contains(&"live"));
        assert!(!imports.contains(&"dead"));
    }

    #[test]
    fn test_style_and_javascript_blocks() {
        let content = r#"{% style %}
.hero { color: red; }
{% endstyle %}
{% javascript %}
console.log('hi');
{% endjavascript %}
"#;
        let chunks = chunker(75).chunk_file("x.liquid", content, Language::Liquid);

        assert!(chunks
            .iter()
            .any(|c| c.symbol_type() == Some(SymbolType::Style)));
        assert!(chunks
            .iter()
            .any(|c| c.symbol_type() == Some(SymbolType::Javascript)));
    }

    #[test]
    fn test_oversized_schema_is_windowed() {
        let mut content = String::from("{% schema %}\n{\n  \"name\": \"Big\",\n  \"settings\": [\n");
        for i in 0..60 {
            content.push_str(&format!("    {{ \"id\": \"s{}\" }},\n", i));
        }
        content.push_str("  ]\n}\n{% endschema %}\n");

        let chunks = chunker(10).chunk_file("big.liquid", &content, Language::Liquid);
        let schema_windows: Vec<_> = chunks
            .iter()
            .filter(|c| c.symbol_type() == Some(SymbolType::Schema))
            .collect();
        assert!(schema_windows.len() > 1);
    }

    #[test]
    fn test_json_template_sections() {
        let content = r#"{
  "sections": {
    "main": { "type": "hero-banner" },
    "grid": { "type": "product-grid" }
  },
  "order": ["main", "grid"]
}
"#;
        let chunks = chunker(75).chunk_file("templates/index.json", content, Language::Json);
        assert!(!chunks.is_empty());
        let imports = chunks[0].imports().unwrap();
        assert!(imports.contains(&"hero-banner".to_string()));
        assert!(imports.contains(&"product-grid".to_string()));
    }

    #[test]
    fn test_section_tag_reference() {
        let content = "{% section 'announcement-bar' %}\n<main></main>\n";
        let chunks = chunker(75).chunk_file("layout/theme.liquid", content, Language::Liquid);
        assert!(chunks.iter().any(|c| c
            .imports()
            .is_some_and(|i| i.contains(&"announcement-bar".to_string()))));
    }
}
