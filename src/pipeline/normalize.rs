//! Inline spacing normalisation around math spans.
//!
//! Models tend to emit `[text("where"), math("x"), text("is")]` with no
//! spaces at the joins, which Notion renders as "wherexis". These rules
//! insert exactly one space at each text/math boundary unless the text
//! already has one or the boundary is a bracket or punctuation.

use crate::ast::Inline;

/// Text ending in one of these needs no space before following math.
const OPENERS: [char; 3] = ['(', '[', '{'];

/// Text starting with one of these needs no space after preceding math.
const PUNCTUATION: [char; 9] = [',', '.', ';', ':', '!', '?', ')', ']', '}'];

/// Return a copy of `inlines` with natural spacing at text/math boundaries.
///
/// Rules, applied once per adjacent pair from left to right:
/// 1. text → math: append a space to the text unless it is empty or
///    already ends with a space or an opening bracket.
/// 2. math → text: prepend a space to the text unless it is empty or
///    already starts with a space or punctuation.
///
/// Never drops or reorders inlines; idempotent.
pub fn normalize_spacing(inlines: &[Inline]) -> Vec<Inline> {
    let mut out = inlines.to_vec();
    if out.len() < 2 {
        return out;
    }

    for i in 0..out.len() - 1 {
        let (head, tail) = out.split_at_mut(i + 1);
        match (&mut head[i], &mut tail[0]) {
            (Inline::Text(text), Inline::Math(_)) => {
                if !text.is_empty() && !text.ends_with(' ') && !text.ends_with(OPENERS) {
                    text.push(' ');
                }
            }
            (Inline::Math(_), Inline::Text(text)) => {
                if !text.is_empty() && !text.starts_with(' ') && !text.starts_with(PUNCTUATION) {
                    text.insert(0, ' ');
                }
            }
            _ => {}
        }
    }

    out
}
