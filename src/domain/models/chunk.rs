use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Language;

/// Represents the kind of slice a chunk covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Class,
    Block,
    Template,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Block => "block",
            ChunkType::Template => "template",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => ChunkType::Function,
            "class" => ChunkType::Class,
            "template" => ChunkType::Template,
            _ => ChunkType::Block,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fine-grained classification of the declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Function,
    Method,
    Class,
    Interface,
    Schema,
    Style,
    Javascript,
    Template,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Method => "method",
            SymbolType::Class => "class",
            SymbolType::Interface => "interface",
            SymbolType::Schema => "schema",
            SymbolType::Style => "style",
            SymbolType::Javascript => "javascript",
            SymbolType::Template => "template",
        }
    }

    /// The chunk type a whole declaration of this symbol kind maps to.
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            SymbolType::Function | SymbolType::Method => ChunkType::Function,
            SymbolType::Class | SymbolType::Interface => ChunkType::Class,
            SymbolType::Schema | SymbolType::Style | SymbolType::Javascript => ChunkType::Template,
            SymbolType::Template => ChunkType::Template,
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A call made from inside a chunk, with the 1-based line it occurs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub symbol: String,
    pub line: u32,
}

/// Halstead measures derived from operator/operand counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HalsteadMetrics {
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    pub bugs: f64,
}

/// A contiguous slice of one source file carrying structural metadata.
///
/// Chunks are the unit of storage and search: the indexer embeds their
/// content, the vector store persists them, and the dependency analyzer
/// reads their import/export metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    file: String,
    content: String,
    start_line: u32,
    end_line: u32,
    language: Language,
    chunk_type: ChunkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol_type: Option<SymbolType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imports: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imported_symbols: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exports: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_sites: Option<Vec<CallSite>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_type: Option<String>,
    complexity: u32,
    cognitive_complexity: u32,
    #[serde(default)]
    halstead: HalsteadMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_id: Option<String>,
}

impl Chunk {
    pub fn new(
        file: String,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        chunk_type: ChunkType,
    ) -> Self {
        debug_assert!(start_line <= end_line);
        Self {
            file,
            content,
            start_line,
            end_line,
            language,
            chunk_type,
            symbol_name: None,
            symbol_type: None,
            parent_class: None,
            parameters: None,
            signature: None,
            imports: None,
            imported_symbols: None,
            exports: None,
            call_sites: None,
            return_type: None,
            complexity: 1,
            cognitive_complexity: 0,
            halstead: HalsteadMetrics::default(),
            repo_id: None,
            org_id: None,
        }
    }

    pub fn with_symbol(mut self, name: impl Into<String>, symbol_type: SymbolType) -> Self {
        self.symbol_name = Some(name.into());
        self.symbol_type = Some(symbol_type);
        self
    }

    pub fn with_parent_class(mut self, parent: impl Into<String>) -> Self {
        self.parent_class = Some(parent.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        if !imports.is_empty() {
            self.imports = Some(imports);
        }
        self
    }

    pub fn with_imported_symbols(mut self, imported: HashMap<String, Vec<String>>) -> Self {
        if !imported.is_empty() {
            self.imported_symbols = Some(imported);
        }
        self
    }

    pub fn with_exports(mut self, exports: Vec<String>) -> Self {
        if !exports.is_empty() {
            self.exports = Some(exports);
        }
        self
    }

    pub fn with_call_sites(mut self, call_sites: Vec<CallSite>) -> Self {
        if !call_sites.is_empty() {
            self.call_sites = Some(call_sites);
        }
        self
    }

    pub fn with_complexity(mut self, cyclomatic: u32, cognitive: u32) -> Self {
        self.complexity = cyclomatic.max(1);
        self.cognitive_complexity = cognitive;
        self
    }

    pub fn with_halstead(mut self, halstead: HalsteadMetrics) -> Self {
        self.halstead = halstead;
        self
    }

    pub fn with_tenant(mut self, repo_id: Option<String>, org_id: Option<String>) -> Self {
        self.repo_id = repo_id;
        self.org_id = org_id;
        self
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol_name.as_deref()
    }

    pub fn symbol_type(&self) -> Option<SymbolType> {
        self.symbol_type
    }

    pub fn parent_class(&self) -> Option<&str> {
        self.parent_class.as_deref()
    }

    pub fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn imports(&self) -> Option<&[String]> {
        self.imports.as_deref()
    }

    pub fn imported_symbols(&self) -> Option<&HashMap<String, Vec<String>>> {
        self.imported_symbols.as_ref()
    }

    pub fn exports(&self) -> Option<&[String]> {
        self.exports.as_deref()
    }

    pub fn call_sites(&self) -> Option<&[CallSite]> {
        self.call_sites.as_deref()
    }

    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    pub fn complexity(&self) -> u32 {
        self.complexity
    }

    pub fn cognitive_complexity(&self) -> u32 {
        self.cognitive_complexity
    }

    pub fn halstead(&self) -> HalsteadMetrics {
        self.halstead
    }

    pub fn repo_id(&self) -> Option<&str> {
        self.repo_id.as_deref()
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    /// Identity of a chunk within an index: file plus line span.
    pub fn key(&self) -> (&str, u32, u32) {
        (&self.file, self.start_line, self.end_line)
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file, self.start_line, self.end_line)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// True when this chunk both imports something and exports names,
    /// which makes its file a candidate barrel re-exporter.
    pub fn is_re_exporter(&self) -> bool {
        let has_imports = self.imports.as_ref().is_some_and(|i| !i.is_empty())
            || self
                .imported_symbols
                .as_ref()
                .is_some_and(|i| !i.is_empty());
        has_imports && self.exports.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn qualified_name(&self) -> Option<String> {
        match (&self.parent_class, &self.symbol_name) {
            (Some(parent), Some(name)) => Some(format!("{}::{}", parent, name)),
            (None, Some(name)) => Some(name.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(
            "src/auth.ts".to_string(),
            "function login() {\n  return true;\n}".to_string(),
            10,
            12,
            Language::TypeScript,
            ChunkType::Function,
        )
        .with_symbol("login", SymbolType::Function);

        assert_eq!(chunk.file(), "src/auth.ts");
        assert_eq!(chunk.symbol_name(), Some("login"));
        assert_eq!(chunk.line_count(), 3);
        assert_eq!(chunk.complexity(), 1);
        assert_eq!(chunk.location(), "src/auth.ts:10-12");
    }

    #[test]
    fn test_qualified_name() {
        let chunk = Chunk::new(
            "src/auth.ts".to_string(),
            "login() {}".to_string(),
            1,
            1,
            Language::TypeScript,
            ChunkType::Function,
        )
        .with_symbol("login", SymbolType::Method)
        .with_parent_class("AuthService");

        assert_eq!(chunk.qualified_name(), Some("AuthService::login".to_string()));
    }

    #[test]
    fn test_re_exporter_detection() {
        let barrel = Chunk::new(
            "src/index.ts".to_string(),
            "export { AuthService } from './auth';".to_string(),
            1,
            1,
            Language::TypeScript,
            ChunkType::Block,
        )
        .with_imports(vec!["./auth".to_string()])
        .with_exports(vec!["AuthService".to_string()]);

        assert!(barrel.is_re_exporter());

        let plain = Chunk::new(
            "src/handler.ts".to_string(),
            "import { AuthService } from './index';".to_string(),
            1,
            1,
            Language::TypeScript,
            ChunkType::Block,
        )
        .with_imports(vec!["./index".to_string()]);

        assert!(!plain.is_re_exporter());
    }

    #[test]
    fn test_empty_metadata_stays_none() {
        let chunk = Chunk::new(
            "a.rs".to_string(),
            "fn a() {}".to_string(),
            1,
            1,
            Language::Rust,
            ChunkType::Function,
        )
        .with_imports(vec![])
        .with_exports(vec![]);

        assert!(chunk.imports().is_none());
        assert!(chunk.exports().is_none());
    }

    #[test]
    fn test_symbol_type_chunk_mapping() {
        assert_eq!(SymbolType::Method.chunk_type(), ChunkType::Function);
        assert_eq!(SymbolType::Interface.chunk_type(), ChunkType::Class);
        assert_eq!(SymbolType::Schema.chunk_type(), ChunkType::Template);
    }
}
