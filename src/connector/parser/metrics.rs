use std::collections::HashSet;

use tree_sitter::Node;

use crate::domain::HalsteadMetrics;

/// Per-declaration complexity measures computed from the AST.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub halstead: HalsteadMetrics,
}

/// Node kinds that open a branch: each adds one decision point and one
/// nesting level. Union across the supported grammars.
const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "if_expression",
    "elif_clause",
    "else_if_clause",
    "for_statement",
    "for_expression",
    "for_in_statement",
    "foreach_statement",
    "enhanced_for_statement",
    "while_statement",
    "while_expression",
    "do_statement",
    "loop_expression",
    "switch_statement",
    "switch_expression",
    "match_expression",
    "when_expression",
    "try_statement",
    "try_expression",
];

/// Kinds counted as decision points without opening a nesting level.
const CASE_KINDS: &[&str] = &[
    "case_clause",
    "switch_case",
    "case_statement",
    "match_arm",
    "when_entry",
    "catch_clause",
    "except_clause",
    "conditional_expression",
    "ternary_expression",
];

/// Leaf kinds classified as operands for Halstead counting.
fn is_operand_kind(kind: &str) -> bool {
    kind.ends_with("identifier")
        || kind.contains("literal")
        || matches!(
            kind,
            "identifier" | "string" | "number" | "integer" | "float" | "true" | "false"
                | "none" | "null" | "char"
        )
}

/// Punctuation that delimits rather than operates.
fn is_delimiter(text: &str) -> bool {
    matches!(text, "(" | ")" | "[" | "]" | "{" | "}" | "," | ";" | ":")
}

fn is_boolean_operator(node: Node, source: &str) -> bool {
    if !matches!(
        node.kind(),
        "binary_expression" | "boolean_operator" | "binary_operator"
    ) {
        return false;
    }
    node.child_by_field_name("operator")
        .and_then(|op| op.utf8_text(source.as_bytes()).ok())
        .is_some_and(|op| matches!(op, "&&" | "||" | "and" | "or"))
}

/// Compute all three measures in one traversal of the declaration node.
pub fn compute_metrics(node: Node, source: &str) -> Metrics {
    let mut cyclomatic: u32 = 1;
    let mut cognitive: u32 = 0;

    let mut distinct_operators: HashSet<String> = HashSet::new();
    let mut distinct_operands: HashSet<String> = HashSet::new();
    let mut total_operators: u64 = 0;
    let mut total_operands: u64 = 0;

    visit(node, 0, &mut |n, nesting| {
        let kind = n.kind();

        if BRANCH_KINDS.contains(&kind) {
            cyclomatic += 1;
            cognitive += 1 + nesting;
        } else if CASE_KINDS.contains(&kind) {
            cyclomatic += 1;
            cognitive += 1;
        } else if is_boolean_operator(n, source) {
            cyclomatic += 1;
            cognitive += 1;
        }

        if n.child_count() == 0 {
            if let Ok(text) = n.utf8_text(source.as_bytes()) {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                if is_operand_kind(kind) {
                    total_operands += 1;
                    distinct_operands.insert(text.to_string());
                } else if !n.is_named() && !is_delimiter(text) && !kind.contains("comment") {
                    total_operators += 1;
                    distinct_operators.insert(text.to_string());
                }
            }
        }
    });

    let halstead = halstead_from_counts(
        distinct_operators.len() as f64,
        distinct_operands.len() as f64,
        total_operators as f64,
        total_operands as f64,
    );

    Metrics {
        cyclomatic,
        cognitive,
        halstead,
    }
}

fn halstead_from_counts(n1: f64, n2: f64, big_n1: f64, big_n2: f64) -> HalsteadMetrics {
    let vocabulary = n1 + n2;
    let length = big_n1 + big_n2;

    let volume = if vocabulary > 0.0 {
        length * vocabulary.log2()
    } else {
        0.0
    };
    let difficulty = if n2 > 0.0 { (n1 / 2.0) * (big_n2 / n2) } else { 0.0 };
    let effort = difficulty * volume;
    let bugs = volume / 3000.0;

    HalsteadMetrics {
        volume,
        difficulty,
        effort,
        bugs,
    }
}

fn visit(node: Node, nesting: u32, f: &mut impl FnMut(Node, u32)) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        f(child, nesting);
        let next = if BRANCH_KINDS.contains(&child.kind()) {
            nesting + 1
        } else {
            nesting
        };
        visit(child, next, f);
    }
}
