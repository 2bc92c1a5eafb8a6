use std::collections::HashMap;

use tree_sitter::{Node, Tree};

use super::traverser::node_text;
use crate::domain::{CallSite, Language};

/// Import/export structure of one file, read straight off the AST.
#[derive(Debug, Clone, Default)]
pub struct FileGraph {
    pub imports: Vec<String>,
    pub imported_symbols: HashMap<String, Vec<String>>,
    pub exports: Vec<String>,
}

impl FileGraph {
    fn add_import(&mut self, target: impl Into<String>) {
        let target = target.into();
        if !target.is_empty() && !self.imports.contains(&target) {
            self.imports.push(target);
        }
    }

    fn add_imported_symbol(&mut self, target: &str, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return;
        }
        let entry = self.imported_symbols.entry(target.to_string()).or_default();
        if !entry.contains(&symbol) {
            entry.push(symbol);
        }
    }

    fn add_export(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() && !self.exports.contains(&name) {
            self.exports.push(name);
        }
    }
}

/// Strip the delimiters an import target is quoted with:
/// `"fmt"` -> `fmt`, `'./auth'` -> `./auth`, `<iostream>` -> `iostream`.
fn strip_import_delimiters(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return trimmed.to_string();
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\''))
        || (trimmed.starts_with('<') && trimmed.ends_with('>'))
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

/// Extract the file-level import/export graph for a language.
pub fn extract_file_graph(language: Language, tree: &Tree, source: &str) -> FileGraph {
    let mut graph = FileGraph::default();
    let root = tree.root_node();
    match language {
        Language::TypeScript | Language::JavaScript => {
            collect_ecmascript(root, source, &mut graph)
        }
        Language::Python => collect_python(root, source, &mut graph),
        Language::Rust => collect_rust(root, source, &mut graph),
        Language::Go => collect_by_kind(root, source, &mut graph, &["import_spec"], "path"),
        Language::Java => collect_dotted_imports(root, source, &mut graph, "import_declaration"),
        Language::CSharp => collect_dotted_imports(root, source, &mut graph, "using_directive"),
        Language::C | Language::Cpp => {
            collect_by_kind(root, source, &mut graph, &["preproc_include"], "path")
        }
        Language::Php => collect_php(root, source, &mut graph),
        Language::Swift => collect_dotted_imports(root, source, &mut graph, "import_declaration"),
        Language::Kotlin => collect_dotted_imports(root, source, &mut graph, "import_header"),
        _ => {}
    }
    graph
}

fn collect_ecmascript(root: Node, source: &str, graph: &mut FileGraph) {
    walk(root, &mut |node| match node.kind() {
        "import_statement" => {
            let Some(target) = node
                .child_by_field_name("source")
                .and_then(|n| node_text(n, source))
                .map(|t| strip_import_delimiters(&t))
            else {
                return false;
            };
            graph.add_import(target.clone());
            for name in import_clause_names(node, source) {
                graph.add_imported_symbol(&target, name);
            }
            false
        }
        "export_statement" => {
            // Re-export: `export { X } from './y'` is both an import of
            // './y' and an export of X.
            let re_export_target = node
                .child_by_field_name("source")
                .and_then(|n| node_text(n, source))
                .map(|t| strip_import_delimiters(&t));
            if let Some(target) = &re_export_target {
                graph.add_import(target.clone());
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "export_clause" => {
                        for name in named_specifiers(child, source) {
                            if let Some(target) = &re_export_target {
                                graph.add_imported_symbol(target, name.clone());
                            }
                            graph.add_export(name);
                        }
                    }
                    "function_declaration"
                    | "generator_function_declaration"
                    | "class_declaration"
                    | "abstract_class_declaration"
                    | "interface_declaration"
                    | "type_alias_declaration"
                    | "enum_declaration" => {
                        if let Some(name) = child
                            .child_by_field_name("name")
                            .and_then(|n| node_text(n, source))
                        {
                            graph.add_export(name);
                        }
                    }
                    "lexical_declaration" | "variable_declaration" => {
                        walk(child, &mut |inner| {
                            if inner.kind() == "variable_declarator" {
                                if let Some(name) = inner
                                    .child_by_field_name("name")
                                    .and_then(|n| node_text(n, source))
                                {
                                    graph.add_export(name);
                                }
                                return false;
                            }
                            true
                        });
                    }
                    "*" => graph.add_export("*"),
                    _ => {}
                }
            }
            true
        }
        "call_expression" => {
            // CommonJS: require('./y').
            let callee = node
                .child_by_field_name("function")
                .and_then(|n| node_text(n, source));
            if callee.as_deref() == Some("require") {
                if let Some(arg) = node
                    .child_by_field_name("arguments")
                    .and_then(|args| args.named_child(0))
                    .filter(|a| a.kind().contains("string"))
                    .and_then(|a| node_text(a, source))
                {
                    graph.add_import(strip_import_delimiters(&arg));
                }
            }
            true
        }
        _ => true,
    });
}

fn import_clause_names(import_node: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    walk(import_node, &mut |node| match node.kind() {
        "import_specifier" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
            {
                names.push(name);
            }
            false
        }
        "identifier" => {
            // Default import binding.
            if let Some(name) = node_text(node, source) {
                names.push(name);
            }
            false
        }
        _ => true,
    });
    names
}

fn named_specifiers(clause: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    walk(clause, &mut |node| {
        if node.kind() == "export_specifier" {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
            {
                names.push(name);
            }
            return false;
        }
        true
    });
    names
}

fn collect_python(root: Node, source: &str, graph: &mut FileGraph) {
    walk(root, &mut |node| match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "dotted_name" || child.kind() == "aliased_import" {
                    let target = if child.kind() == "aliased_import" {
                        child
                            .child_by_field_name("name")
                            .and_then(|n| node_text(n, source))
                    } else {
                        node_text(child, source)
                    };
                    if let Some(target) = target {
                        graph.add_import(target);
                    }
                }
            }
            false
        }
        "import_from_statement" => {
            let Some(target) = node
                .child_by_field_name("module_name")
                .and_then(|n| node_text(n, source))
            else {
                return false;
            };
            graph.add_import(target.clone());
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "dotted_name" {
                    if let Some(name) = node_text(child, source) {
                        if name != target {
                            graph.add_imported_symbol(&target, name);
                        }
                    }
                }
            }
            false
        }
        // Module-level definitions are the file's importable surface.
        "function_definition" | "class_definition" => {
            if node.parent().map(|p| p.kind()) == Some("module") {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    graph.add_export(name);
                }
            }
            false
        }
        _ => true,
    });
}

fn collect_rust(root: Node, source: &str, graph: &mut FileGraph) {
    walk(root, &mut |node| match node.kind() {
        "use_declaration" => {
            if let Some(argument) = node.child_by_field_name("argument") {
                collect_rust_use(argument, source, graph);
            }
            false
        }
        "function_item" | "struct_item" | "enum_item" | "trait_item" | "mod_item"
        | "type_item" => {
            let is_pub = node
                .child(0)
                .is_some_and(|c| c.kind() == "visibility_modifier");
            if is_pub {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                {
                    graph.add_export(name);
                }
            }
            node.kind() == "mod_item"
        }
        _ => true,
    });
}

fn collect_rust_use(argument: Node, source: &str, graph: &mut FileGraph) {
    match argument.kind() {
        "scoped_identifier" => {
            let path = argument
                .child_by_field_name("path")
                .and_then(|n| node_text(n, source));
            let name = argument
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source));
            match (path, name) {
                (Some(path), Some(name)) => {
                    graph.add_import(path.clone());
                    graph.add_imported_symbol(&path, name);
                }
                (None, Some(name)) => graph.add_import(name),
                _ => {}
            }
        }
        "scoped_use_list" => {
            let path = argument
                .child_by_field_name("path")
                .and_then(|n| node_text(n, source));
            if let Some(path) = path {
                graph.add_import(path.clone());
                if let Some(list) = argument.child_by_field_name("list") {
                    let mut cursor = list.walk();
                    for item in list.named_children(&mut cursor) {
                        if let Some(name) = node_text(item, source) {
                            graph.add_imported_symbol(&path, name);
                        }
                    }
                }
            }
        }
        "use_as_clause" => {
            if let Some(path) = argument.child_by_field_name("path") {
                collect_rust_use(path, source, graph);
            }
        }
        "identifier" | "crate" | "self" | "super" => {
            if let Some(name) = node_text(argument, source) {
                graph.add_import(name);
            }
        }
        _ => {
            if let Some(text) = node_text(argument, source) {
                graph.add_import(text);
            }
        }
    }
}

fn collect_php(root: Node, source: &str, graph: &mut FileGraph) {
    walk(root, &mut |node| match node.kind() {
        "namespace_use_clause" => {
            if let Some(name) = node_text(node, source) {
                graph.add_import(name);
            }
            false
        }
        "class_declaration" | "function_definition" | "interface_declaration"
        | "trait_declaration" | "enum_declaration" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
            {
                graph.add_export(name);
            }
            false
        }
        _ => true,
    });
}

/// Imports where the target lives under a named field of a fixed node kind
/// (Go `import_spec`, C/C++ `preproc_include`).
fn collect_by_kind(
    root: Node,
    source: &str,
    graph: &mut FileGraph,
    kinds: &[&str],
    field: &str,
) {
    walk(root, &mut |node| {
        if kinds.contains(&node.kind()) {
            if let Some(target) = node
                .child_by_field_name(field)
                .or_else(|| {
                    node.named_child(
                        u32::try_from(node.named_child_count().saturating_sub(1)).unwrap_or(0),
                    )
                })
                .and_then(|n| node_text(n, source))
            {
                graph.add_import(strip_import_delimiters(&target));
            }
            return false;
        }
        true
    });
}

/// Imports expressed as dotted identifier paths under one node kind
/// (Java, C#, Swift, Kotlin).
fn collect_dotted_imports(root: Node, source: &str, graph: &mut FileGraph, kind: &str) {
    walk(root, &mut |node| {
        if node.kind() == kind {
            let target = node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
                .or_else(|| {
                    let mut cursor = node.walk();
                    let found = node
                        .named_children(&mut cursor)
                        .find(|c| c.kind().contains("identifier") || c.kind().contains("name"));
                    found.and_then(|c| node_text(c, source))
                });
            if let Some(target) = target {
                graph.add_import(target);
            }
            return false;
        }
        true
    });
}

/// Detail metadata for one extracted declaration.
#[derive(Debug, Clone, Default)]
pub struct SymbolDetails {
    pub parameters: Option<Vec<String>>,
    pub signature: Option<String>,
    pub return_type: Option<String>,
    pub call_sites: Vec<CallSite>,
}

const CALL_KINDS: &[&str] = &[
    "call_expression",
    "call",
    "method_invocation",
    "invocation_expression",
    "function_call_expression",
    "member_call_expression",
    "scoped_call_expression",
    "macro_invocation",
];

pub fn extract_symbol_details(node: Node, source: &str) -> SymbolDetails {
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| {
            let mut cursor = params.walk();
            params
                .named_children(&mut cursor)
                .filter(|p| !p.kind().contains("comment"))
                .filter_map(|p| node_text(p, source))
                .collect::<Vec<_>>()
        })
        .filter(|p: &Vec<String>| !p.is_empty());

    let return_type = node
        .child_by_field_name("return_type")
        .or_else(|| node.child_by_field_name("result"))
        .and_then(|n| node_text(n, source));

    let signature = node
        .utf8_text(source.as_bytes())
        .ok()
        .and_then(|text| text.lines().next())
        .map(|line| line.trim().trim_end_matches('{').trim().to_string())
        .filter(|s| !s.is_empty());

    let mut call_sites = Vec::new();
    walk(node, &mut |inner| {
        if CALL_KINDS.contains(&inner.kind()) {
            if let Some(symbol) = callee_name(inner, source) {
                if symbol.len() >= 2 {
                    call_sites.push(CallSite {
                        symbol,
                        line: inner.start_position().row as u32 + 1,
                    });
                }
            }
        }
        true
    });

    SymbolDetails {
        parameters,
        signature,
        return_type,
        call_sites,
    }
}

/// The identifier a call resolves to, reduced through member/attribute
/// accessors to the trailing name.
fn callee_name(call: Node, source: &str) -> Option<String> {
    let mut current = call
        .child_by_field_name("function")
        .or_else(|| call.child_by_field_name("name"))
        .or_else(|| call.child_by_field_name("macro"))
        .or_else(|| call.named_child(0))?;

    loop {
        match current.kind() {
            "member_expression" | "field_expression" | "attribute" | "navigation_expression"
            | "selector_expression" | "scoped_identifier" | "qualified_identifier" => {
                current = current
                    .child_by_field_name("property")
                    .or_else(|| current.child_by_field_name("field"))
                    .or_else(|| current.child_by_field_name("attribute"))
                    .or_else(|| current.child_by_field_name("name"))
                    .or_else(|| {
                        current.named_child(
                            u32::try_from(current.named_child_count().saturating_sub(1))
                                .unwrap_or(0),
                        )
                    })?;
            }
            _ => return node_text(current, source),
        }
    }
}

/// Depth-first walk; the callback returns whether to descend further.
pub(crate) fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>) -> bool) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if visit(child) {
            walk(child, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::parser::Traverser;

    fn graph_for(language: Language, source: &str) -> FileGraph {
        let traverser = Traverser::for_language(language).unwrap();
        let tree = traverser.parse(source).unwrap();
        extract_file_graph(language, &tree, source)
    }

    #[test]
    fn test_typescript_imports_and_exports() {
        let source = r#"
import { AuthService } from './auth';
import config from './config';

export function login() {}
export const TIMEOUT = 30;
"#;
        let graph = graph_for(Language::TypeScript, source);
        assert!(graph.imports.contains(&"./auth".to_string()));
        assert!(graph.imports.contains(&"./config".to_string()));
        assert_eq!(
            graph.imported_symbols.get("./auth"),
            Some(&vec!["AuthService".to_string()])
        );
        assert!(graph.exports.contains(&"login".to_string()));
        assert!(graph.exports.contains(&"TIMEOUT".to_string()));
    }

    #[test]
    fn test_typescript_barrel_re_export() {
        let source = "export { AuthService } from './auth';\n";
        let graph = graph_for(Language::TypeScript, source);
        assert!(graph.imports.contains(&"./auth".to_string()));
        assert!(graph.exports.contains(&"AuthService".to_string()));
    }

    #[test]
    fn test_python_imports() {
        let source = r#"
import os
from app.models import User

def handler():
    pass
"#;
        let graph = graph_for(Language::Python, source);
        assert!(graph.imports.contains(&"os".to_string()));
        assert!(graph.imports.contains(&"app.models".to_string()));
        assert_eq!(
            graph.imported_symbols.get("app.models"),
            Some(&vec!["User".to_string()])
        );
        assert!(graph.exports.contains(&"handler".to_string()));
    }

    #[test]
    fn test_rust_use_declarations() {
        let source = r#"
use crate::auth::Session;
use std::collections::{HashMap, HashSet};

pub fn login() {}
fn private_helper() {}
"#;
        let graph = graph_for(Language::Rust, source);
        assert!(graph.imports.contains(&"crate::auth".to_string()));
        assert!(graph.imports.contains(&"std::collections".to_string()));
        assert_eq!(
            graph.imported_symbols.get("crate::auth"),
            Some(&vec!["Session".to_string()])
        );
        assert!(graph.exports.contains(&"login".to_string()));
        assert!(!graph.exports.contains(&"private_helper".to_string()));
    }

    #[test]
    fn test_go_imports_strip_quotes() {
        let source = r#"
package main

import (
    "fmt"
    "net/http"
)
"#;
        let graph = graph_for(Language::Go, source);
        assert!(graph.imports.contains(&"fmt".to_string()));
        assert!(graph.imports.contains(&"net/http".to_string()));
    }

    #[test]
    fn test_cpp_includes_strip_delimiters() {
        let source = "#include <iostream>\n#include \"auth.h\"\nint main() { return 0; }\n";
        let graph = graph_for(Language::Cpp, source);
        assert!(graph.imports.contains(&"iostream".to_string()));
        assert!(graph.imports.contains(&"auth.h".to_string()));
    }

    #[test]
    fn test_symbol_details_for_function() {
        let source = r#"
fn transfer(amount: u64, target: &str) -> Result<(), Error> {
    validate(amount);
    commit(target);
    Ok(())
}
"#;
        let traverser = Traverser::for_language(Language::Rust).unwrap();
        let tree = traverser.parse(source).unwrap();
        let declarations = traverser.extract_declarations(&tree, source);
        let details = extract_symbol_details(declarations[0].node, source);

        assert_eq!(
            details.parameters,
            Some(vec!["amount: u64".to_string(), "target: &str".to_string()])
        );
        assert!(details.signature.unwrap().starts_with("fn transfer"));
        assert_eq!(details.return_type, Some("Result<(), Error>".to_string()));
        let callees: Vec<_> = details.call_sites.iter().map(|c| c.symbol.as_str()).collect();
        assert!(callees.contains(&"validate"));
        assert!(callees.contains(&"commit"));
    }

    #[test]
    fn test_commonjs_require() {
        let source = "const auth = require('./auth');\n";
        let graph = graph_for(Language::JavaScript, source);
        assert!(graph.imports.contains(&"./auth".to_string()));
    }
}
