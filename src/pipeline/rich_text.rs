//! Inline spans → Notion rich-text segments.

use crate::ast::Inline;
use crate::blocks::RichText;

/// Map inlines to rich text in order. Empty text and empty LaTeX contribute nothing.
pub fn to_rich_text(inlines: &[Inline]) -> Vec<RichText> {
    inlines
        .iter()
        .filter_map(|inline| match inline {
            Inline::Text(text) if !text.is_empty() => Some(RichText::text(text.as_str())),
            Inline::Math(latex) if !latex.is_empty() => Some(RichText::equation(latex.as_str())),
            _ => None,
        })
        .collect()
}
