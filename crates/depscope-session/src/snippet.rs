//! Padded source excerpts around a cause

use depscope_core::CodeSnippet;
use depscope_indexer::Span;

/// Cut lines `[span.start - padding, span.end + padding]` out of `text`,
/// clamped to the file. `None` for an empty file.
pub fn extract_snippet(text: &str, span: Span, padding: usize) -> Option<CodeSnippet> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let highlight = (span.start as usize, span.end as usize);
    let end = (highlight.1 + padding).min(lines.len());
    let start = highlight.0.saturating_sub(padding).max(1).min(end);

    Some(CodeSnippet {
        content: lines[start - 1..end].join("\n"),
        highlight,
        lines_span: (start, end),
    })
}
