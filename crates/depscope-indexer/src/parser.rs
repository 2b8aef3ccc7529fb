//! tree-sitter front end for scanned module source
//!
//! Source is parsed with the `tree-sitter-elixir` grammar and lowered into
//! the [`Expr`] tree the scanner walks. Tree-sitter parsers are neither
//! `Send` nor `Sync`, so every worker thread keeps its own.

use std::cell::RefCell;

use thiserror::Error;
use tree_sitter::{Language, Node, Parser};

use crate::ast::Expr;
use crate::lower::Lowering;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

thread_local! {
    static PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

/// The tree-sitter language for scanned source.
pub fn language() -> Language {
    tree_sitter_elixir::LANGUAGE.into()
}

/// Parse a whole source file into its top-level expressions.
///
/// A tree containing `ERROR` or missing nodes is rejected with the line of
/// the first one.
pub fn parse(source: &str) -> Result<Vec<Expr>, ParseError> {
    let tree = PARSER.with(|slot| {
        let mut slot = slot.borrow_mut();
        let mut parser = match slot.take() {
            Some(parser) => parser,
            None => new_parser()?,
        };
        let tree = parser.parse(source, None);
        *slot = Some(parser);
        tree.ok_or_else(|| ParseError { line: 1, message: "parser produced no tree".to_string() })
    })?;

    let root = tree.root_node();
    if let Some(node) = first_error(root) {
        return Err(describe_error(node, source));
    }
    Ok(Lowering::new(source.as_bytes()).source(root))
}

fn new_parser() -> Result<Parser, ParseError> {
    let mut parser = Parser::new();
    parser.set_language(&language()).map_err(|e| ParseError {
        line: 1,
        message: format!("Failed to set language: {}", e),
    })?;
    Ok(parser)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn describe_error(node: Node<'_>, source: &str) -> ParseError {
    let line = u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX);
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
        let near: String = text.lines().next().unwrap_or_default().trim().chars().take(40).collect();
        format!("syntax error near `{}`", near)
    };
    ParseError { line, message }
}
