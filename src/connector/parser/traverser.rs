use std::collections::HashSet;

use tree_sitter::{Node, Parser, Tree};

use crate::domain::{DomainError, Language, SymbolType};

/// One declaration found by the traversal: the syntax node, the declared
/// name, the enclosing container's name, and the symbol classification.
#[derive(Debug, Clone)]
pub struct Declaration<'t> {
    pub node: Node<'t>,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub symbol_type: SymbolType,
}

impl Declaration<'_> {
    pub fn start_line(&self) -> u32 {
        self.node.start_position().row as u32 + 1
    }

    pub fn end_line(&self) -> u32 {
        self.node.end_position().row as u32 + 1
    }
}

/// Closed-world language dispatch for AST traversal. Each variant supplies
/// the grammar plus the node-kind tables the shared engine walks with;
/// adding a language is adding one variant and its table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traverser {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    CSharp,
    Cpp,
    Php,
    Swift,
    Kotlin,
}

impl Traverser {
    pub fn for_language(language: Language) -> Option<Self> {
        match language {
            Language::Rust => Some(Traverser::Rust),
            Language::Python => Some(Traverser::Python),
            Language::JavaScript => Some(Traverser::JavaScript),
            Language::TypeScript => Some(Traverser::TypeScript),
            Language::Go => Some(Traverser::Go),
            Language::Java => Some(Traverser::Java),
            Language::CSharp => Some(Traverser::CSharp),
            // C parses under the C++ grammar; the subset is compatible.
            Language::C | Language::Cpp => Some(Traverser::Cpp),
            Language::Php => Some(Traverser::Php),
            Language::Swift => Some(Traverser::Swift),
            Language::Kotlin => Some(Traverser::Kotlin),
            _ => None,
        }
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Traverser::Rust => tree_sitter_rust::LANGUAGE.into(),
            Traverser::Python => tree_sitter_python::LANGUAGE.into(),
            Traverser::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Traverser::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Traverser::Go => tree_sitter_go::LANGUAGE.into(),
            Traverser::Java => tree_sitter_java::LANGUAGE.into(),
            Traverser::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Traverser::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Traverser::Php => tree_sitter_php::LANGUAGE_PHP.into(),
            Traverser::Swift => tree_sitter_swift::LANGUAGE.into(),
            Traverser::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
        }
    }

    /// Parse `content` with this traverser's grammar.
    pub fn parse(&self, content: &str) -> Result<Tree, DomainError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| DomainError::parse(format!("Failed to set language: {}", e)))?;
        parser
            .parse(content, None)
            .ok_or_else(|| DomainError::parse("Failed to parse file"))
    }

    /// Grammar node kinds that are declarations to extract.
    pub fn target_node_types(&self) -> &'static [&'static str] {
        match self {
            Traverser::Rust => &["function_item", "struct_item", "enum_item", "union_item"],
            Traverser::Python => &["function_definition"],
            Traverser::JavaScript => &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
            ],
            Traverser::TypeScript => &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
                "interface_declaration",
            ],
            Traverser::Go => &[
                "function_declaration",
                "method_declaration",
                "type_declaration",
            ],
            Traverser::Java => &[
                "method_declaration",
                "constructor_declaration",
                "interface_declaration",
                "enum_declaration",
                "record_declaration",
            ],
            Traverser::CSharp => &[
                "method_declaration",
                "constructor_declaration",
                "interface_declaration",
                "struct_declaration",
                "enum_declaration",
                "record_declaration",
            ],
            Traverser::Cpp => &["function_definition", "enum_specifier"],
            Traverser::Php => &[
                "function_definition",
                "method_declaration",
                "interface_declaration",
                "enum_declaration",
            ],
            Traverser::Swift => &["function_declaration", "protocol_declaration"],
            Traverser::Kotlin => &["function_declaration", "object_declaration"],
        }
    }

    /// Grammar node kinds that group declarations: visited, not extracted.
    pub fn container_types(&self) -> &'static [&'static str] {
        match self {
            Traverser::Rust => &["impl_item", "trait_item", "mod_item"],
            Traverser::Python => &["class_definition"],
            Traverser::JavaScript => &["class_declaration", "class"],
            Traverser::TypeScript => &[
                "class_declaration",
                "abstract_class_declaration",
                "class",
            ],
            Traverser::Go => &[],
            Traverser::Java => &["class_declaration"],
            Traverser::CSharp => &["class_declaration", "namespace_declaration"],
            Traverser::Cpp => &[
                "class_specifier",
                "struct_specifier",
                "namespace_definition",
            ],
            Traverser::Php => &["class_declaration", "trait_declaration", "namespace_definition"],
            Traverser::Swift => &["class_declaration"],
            Traverser::Kotlin => &["class_declaration"],
        }
    }

    /// Variable-declaration nodes that may carry a function value
    /// (`const handler = () => …`).
    pub fn declaration_types(&self) -> &'static [&'static str] {
        match self {
            Traverser::Rust => &["let_declaration", "const_item", "static_item"],
            Traverser::Python => &["assignment"],
            Traverser::JavaScript | Traverser::TypeScript => &["variable_declarator"],
            Traverser::Php => &["expression_statement"],
            _ => &[],
        }
    }

    /// Grammar node kinds that are function values.
    pub fn function_types(&self) -> &'static [&'static str] {
        match self {
            Traverser::Rust => &["closure_expression"],
            Traverser::Python => &["lambda"],
            Traverser::JavaScript | Traverser::TypeScript => {
                &["arrow_function", "function_expression", "generator_function"]
            }
            Traverser::Php => &["anonymous_function_creation_expression", "arrow_function"],
            Traverser::Kotlin => &["lambda_literal"],
            _ => &[],
        }
    }

    /// Whether to recurse into an extracted declaration looking for more.
    /// Off everywhere: nested functions stay part of their parent's chunk,
    /// which keeps chunks of one file non-overlapping.
    pub fn should_extract_children(&self, _node: Node) -> bool {
        false
    }

    /// Whether a non-container, non-declaration node is worth descending
    /// into. Leaves, comments, and strings are not.
    pub fn should_traverse_children(&self, node: Node) -> bool {
        if node.child_count() == 0 {
            return false;
        }
        !matches!(node.kind(), "comment" | "line_comment" | "block_comment")
            && !node.kind().contains("string")
    }

    pub fn is_declaration_with_function(&self, node: Node) -> bool {
        self.find_function_in_declaration(node).is_some()
    }

    /// Find the function value directly inside a declaration node.
    pub fn find_function_in_declaration<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let function_types = self.function_types();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if function_types.contains(&child.kind()) {
                return Some(child);
            }
            // One level deeper covers `= (a) => …` behind an assignment
            // expression or parenthesis.
            let mut inner = child.walk();
            for grandchild in child.children(&mut inner) {
                if function_types.contains(&grandchild.kind()) {
                    return Some(grandchild);
                }
            }
        }
        None
    }

    /// Field accessor into a container's body, with a kind-based fallback
    /// for grammars that do not expose a `body` field.
    pub fn get_container_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        if let Some(body) = node.child_by_field_name("body") {
            return Some(body);
        }
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).find(|child| {
            matches!(
                child.kind(),
                "class_body" | "declaration_list" | "field_declaration_list" | "block"
            )
        });
        found
    }

    /// Walk the parent chain to the nearest enclosing container's name.
    pub fn find_parent_container_name(&self, node: Node, source: &str) -> Option<String> {
        let containers = self.container_types();
        let mut current = node.parent();
        while let Some(parent) = current {
            if containers.contains(&parent.kind()) {
                if let Some(name) = self.container_name(parent, source) {
                    return Some(name);
                }
            }
            current = parent.parent();
        }
        None
    }

    /// The name a container contributes as `parent_class`.
    fn container_name(&self, node: Node, source: &str) -> Option<String> {
        if node.kind() == "impl_item" {
            // `impl Foo` / `impl Trait for Foo`: the type is the parent.
            return node
                .child_by_field_name("type")
                .and_then(|n| node_text(n, source));
        }
        node.child_by_field_name("name")
            .and_then(|n| node_text(n, source))
            .or_else(|| first_identifier_text(node, source))
    }

    /// The declared name of a target or declaration node.
    pub fn declaration_name(&self, node: Node, source: &str) -> Option<String> {
        match node.kind() {
            // Go groups type specs under one declaration node.
            "type_declaration" => {
                let mut cursor = node.walk();
                let found = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "type_spec")
                    .and_then(|spec| spec.child_by_field_name("name"));
                found.and_then(|n| node_text(n, source))
            }
            // C/C++ bury the name inside the declarator chain.
            "function_definition" if matches!(self, Traverser::Cpp) => {
                cpp_declarator_name(node, source)
            }
            "assignment" => node
                .child_by_field_name("left")
                .and_then(|n| node_text(n, source)),
            "let_declaration" => node
                .child_by_field_name("pattern")
                .and_then(|n| node_text(n, source)),
            "expression_statement" => {
                // PHP `$x = function () {}`: name from the assignment target.
                let mut cursor = node.walk();
                let found = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "assignment_expression")
                    .and_then(|a| a.child_by_field_name("left"));
                found.and_then(|n| node_text(n, source))
            }
            _ => node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
                .or_else(|| first_identifier_text(node, source)),
        }
    }

    /// Symbol classification for an extracted node.
    fn classify(&self, kind: &str, parent: Option<&str>) -> SymbolType {
        match kind {
            "interface_declaration" | "protocol_declaration" => SymbolType::Interface,
            "struct_item" | "enum_item" | "union_item" | "type_declaration"
            | "enum_declaration" | "record_declaration" | "struct_declaration"
            | "enum_specifier" | "object_declaration" => SymbolType::Class,
            _ if parent.is_some() => SymbolType::Method,
            _ => SymbolType::Function,
        }
    }

    /// Run the shared traversal engine over a parsed tree, producing
    /// declarations deduplicated by `(start_line, end_line, name)`.
    pub fn extract_declarations<'t>(&self, tree: &'t Tree, source: &str) -> Vec<Declaration<'t>> {
        let mut declarations = Vec::new();
        self.visit_children(tree.root_node(), source, None, &mut declarations);

        let mut seen = HashSet::new();
        declarations.retain(|d| {
            seen.insert((d.start_line(), d.end_line(), d.name.clone()))
        });
        declarations.sort_by_key(|d| (d.start_line(), d.end_line()));
        declarations
    }

    fn visit_children<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        parent: Option<&str>,
        out: &mut Vec<Declaration<'t>>,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_node(child, source, parent, out);
        }
    }

    fn visit_node<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        parent: Option<&str>,
        out: &mut Vec<Declaration<'t>>,
    ) {
        let kind = node.kind();

        if self.target_node_types().contains(&kind) {
            let name = self.declaration_name(node, source);
            let parent_name = parent
                .map(str::to_string)
                .or_else(|| self.find_parent_container_name(node, source));
            let symbol_type = self.classify(kind, parent_name.as_deref());
            out.push(Declaration {
                node,
                name,
                parent: parent_name,
                symbol_type,
            });
            if self.should_extract_children(node) {
                self.visit_children(node, source, parent, out);
            }
            return;
        }

        if self.container_types().contains(&kind) {
            let container = self.container_name(node, source);
            let body = self.get_container_body(node).unwrap_or(node);
            self.visit_children(body, source, container.as_deref().or(parent), out);
            return;
        }

        if self.declaration_types().contains(&kind) && self.is_declaration_with_function(node) {
            let name = self.declaration_name(node, source);
            let symbol_type = if parent.is_some() {
                SymbolType::Method
            } else {
                SymbolType::Function
            };
            out.push(Declaration {
                node,
                name,
                parent: parent.map(str::to_string),
                symbol_type,
            });
            return;
        }

        if self.should_traverse_children(node) {
            self.visit_children(node, source, parent, out);
        }
    }
}

pub(crate) fn node_text(node: Node, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes())
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_identifier_text(node: Node, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|c| c.kind().ends_with("identifier"));
    found.and_then(|c| node_text(c, source))
}

/// Unwrap a C/C++ declarator chain down to the declared name.
fn cpp_declarator_name(node: Node, source: &str) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "destructor_name" | "operator_name" => {
                return node_text(current, source);
            }
            "qualified_identifier" => {
                current = current.child_by_field_name("name")?;
            }
            _ => {
                current = current.child_by_field_name("declarator")?;
            }
        }
    }
}
