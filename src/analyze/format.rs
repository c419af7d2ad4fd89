//! Canonical re-rendering of call expression snippets for display.
//!
//! The snippet is parsed on its own as the value of a package-level `var`.
//! If that yields exactly one expression, its tokens are re-emitted with
//! normalised spacing and 4-space indentation; otherwise the input is
//! returned unchanged. Formatting never fails.
//!
//! Spacing is fixed only around punctuation (no space inside brackets or
//! before `,`, one space after `,`). Between any other tokens, binary
//! operators included, a run of whitespace in the input collapses to one
//! space and no whitespace stays none, so `a+b` and `a + b` both survive
//! as written. gofmt's precedence-dependent operator spacing is not
//! reproduced.

use super::go_parser;
use std::path::Path;

const PREFIX: &str = "package p\n\nvar _ = ";

/// Token kinds emitted verbatim without descending into their children.
const ATOMIC: &[&str] = &[
    "interpreted_string_literal",
    "raw_string_literal",
    "rune_literal",
    "comment",
];

const INDENT: &str = "    ";

/// Re-render an expression snippet; returns the input on any parse failure.
pub fn format_snippet(snippet: &str) -> String {
    try_format(snippet).unwrap_or_else(|| snippet.to_string())
}

struct Token<'a> {
    text: &'a str,
    start_row: usize,
    end_row: usize,
    /// Whitespace separated this token from the previous one in the input.
    gap: bool,
}

fn try_format(snippet: &str) -> Option<String> {
    let trimmed = snippet.trim();
    if trimmed.is_empty() {
        return None;
    }

    let wrapped = format!("{}{}\n", PREFIX, trimmed);
    let mut parser = go_parser(Path::new("<snippet>")).ok()?;
    let tree = parser.parse(&wrapped, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let expr = single_expression(root)?;
    if expr.start_byte() != PREFIX.len() || expr.end_byte() != PREFIX.len() + trimmed.len() {
        return None;
    }

    let tokens = leaf_tokens(expr, &wrapped);
    Some(render(&tokens))
}

/// The only expression in `var _ = <expr>`.
fn single_expression(root: tree_sitter::Node) -> Option<tree_sitter::Node> {
    let decl = root
        .named_children(&mut root.walk())
        .find(|n| n.kind() == "var_declaration")?;
    let spec = decl
        .named_children(&mut decl.walk())
        .find(|n| n.kind() == "var_spec")?;
    let values = spec.child_by_field_name("value")?;
    if values.named_child_count() != 1 {
        return None;
    }
    values.named_child(0)
}

fn leaf_tokens<'a>(expr: tree_sitter::Node, source: &'a str) -> Vec<Token<'a>> {
    let mut tokens = Vec::new();
    let mut last_end = expr.start_byte();
    let mut stack = vec![expr];

    while let Some(node) = stack.pop() {
        if node.child_count() > 0 && !ATOMIC.contains(&node.kind()) {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
            continue;
        }

        let text = &source[node.byte_range()];
        if text.trim().is_empty() {
            continue;
        }
        tokens.push(Token {
            text,
            start_row: node.start_position().row,
            end_row: node.end_position().row,
            gap: node.start_byte() > last_end,
        });
        last_end = node.end_byte();
    }

    tokens
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    // Row of every bracket still open.
    let mut open: Vec<usize> = Vec::new();
    let mut prev: Option<&Token> = None;

    for (idx, token) in tokens.iter().enumerate() {
        match prev {
            Some(p) if token.start_row > p.end_row => {
                let closers = tokens[idx..]
                    .iter()
                    .take_while(|t| t.start_row == token.start_row && is_closer(t.text))
                    .count();
                let depth = distinct_rows(&open[..open.len().saturating_sub(closers)]);
                out.push('\n');
                for _ in 0..depth {
                    out.push_str(INDENT);
                }
            }
            Some(p) if wants_space(p.text, token.text, token.gap) => out.push(' '),
            _ => {}
        }

        out.push_str(token.text);
        if is_opener(token.text) {
            open.push(token.start_row);
        } else if is_closer(token.text) {
            open.pop();
        }
        prev = Some(token);
    }

    out
}

/// Brackets opened on the same line only indent once.
fn distinct_rows(rows: &[usize]) -> usize {
    rows.iter()
        .enumerate()
        .filter(|(i, row)| *i == 0 || rows[i - 1] != **row)
        .count()
}

fn is_opener(text: &str) -> bool {
    matches!(text, "(" | "[" | "{")
}

fn is_closer(text: &str) -> bool {
    matches!(text, ")" | "]" | "}")
}

/// Whether a space goes between `prev` and `cur`; `gap` is whether the input
/// had whitespace there.
fn wants_space(prev: &str, cur: &str, gap: bool) -> bool {
    if matches!(prev, "(" | "[" | ".") || matches!(cur, ")" | "]" | "," | "." | ";" | ":") {
        return false;
    }
    if prev == "," {
        return true;
    }
    if matches!(cur, "(" | "[") {
        let word_end = prev
            .chars()
            .last()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if word_end || matches!(prev, ")" | "]") {
            return false;
        }
    }
    gap
}
