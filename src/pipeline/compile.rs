//! Semantic AST → Notion blocks.
//!
//! | AST block    | Notion block(s)                                  |
//! |--------------|--------------------------------------------------|
//! | `heading`    | one `heading_3`, omitted if its rich text is empty |
//! | `paragraph`  | one `paragraph`, same rule                       |
//! | `math_block` | one `equation` from the trimmed LaTeX, omitted if empty |
//! | `bullets`    | one `bulleted_list_item` per non-empty item      |
//! | `numbered`   | one `numbered_list_item` per non-empty item      |
//!
//! The document title is never emitted. Compilation is pure: the same AST
//! always yields the same blocks.

use crate::ast::{AstBlock, Document, Inline};
use crate::blocks::{Block, HeadingLevel, RichText};
use crate::pipeline::normalize::normalize_spacing;
use crate::pipeline::rich_text::to_rich_text;

/// Compile a document into destination blocks, in document order.
pub fn compile(doc: &Document) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(doc.blocks.len());

    for block in &doc.blocks {
        match block {
            AstBlock::Heading(inlines) => {
                if let Some(rich_text) = rich_text_of(inlines) {
                    blocks.push(Block::Heading {
                        level: HeadingLevel::H3,
                        rich_text,
                    });
                }
            }
            AstBlock::Paragraph(inlines) => {
                if let Some(rich_text) = rich_text_of(inlines) {
                    blocks.push(Block::Paragraph { rich_text });
                }
            }
            AstBlock::MathBlock(latex) => {
                let expression = latex.trim();
                if !expression.is_empty() {
                    blocks.push(Block::Equation {
                        expression: expression.to_string(),
                    });
                }
            }
            AstBlock::Bullets(items) => blocks.extend(
                items
                    .iter()
                    .filter_map(|item| rich_text_of(item))
                    .map(|rich_text| Block::BulletedListItem { rich_text }),
            ),
            AstBlock::Numbered(items) => blocks.extend(
                items
                    .iter()
                    .filter_map(|item| rich_text_of(item))
                    .map(|rich_text| Block::NumberedListItem { rich_text }),
            ),
        }
    }

    blocks
}

/// Compile `doc` under a level-1 section heading.
pub fn compile_section(heading: &str, doc: &Document) -> Vec<Block> {
    let mut blocks = vec![Block::section_heading(heading)];
    blocks.extend(compile(doc));
    blocks
}

fn rich_text_of(inlines: &[Inline]) -> Option<Vec<RichText>> {
    let rich_text = to_rich_text(&normalize_spacing(inlines));
    (!rich_text.is_empty()).then_some(rich_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(blocks: Vec<AstBlock>) -> Document {
        Document {
            title: "Slide title".into(),
            blocks,
        }
    }

    #[test]
    fn empty_paragraph_compiles_to_nothing() {
        let d = doc(vec![AstBlock::Paragraph(vec![Inline::text("")])]);
        assert!(compile(&d).is_empty());
    }

    #[test]
    fn empty_heading_and_blank_math_are_omitted() {
        let d = doc(vec![
            AstBlock::Heading(vec![]),
            AstBlock::MathBlock("   \n".into()),
        ]);
        assert!(compile(&d).is_empty());
    }

    #[test]
    fn bullets_emit_one_block_per_item_in_order() {
        let d = doc(vec![AstBlock::Bullets(vec![
            vec![Inline::text("first")],
            vec![Inline::text("second")],
        ])]);
        let blocks = compile(&d);
        assert_eq!(
            blocks,
            vec![
                Block::BulletedListItem {
                    rich_text: vec![RichText::text("first")]
                },
                Block::BulletedListItem {
                    rich_text: vec![RichText::text("second")]
                },
            ]
        );
    }

    #[test]
    fn empty_list_items_are_skipped() {
        let d = doc(vec![AstBlock::Numbered(vec![
            vec![Inline::text("Q1")],
            vec![],
            vec![Inline::math("")],
            vec![Inline::text("Q2")],
        ])]);
        let blocks = compile(&d);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.kind() == "numbered_list_item"));
    }

    #[test]
    fn heading_is_level_three_and_normalised() {
        let d = doc(vec![AstBlock::Heading(vec![Inline::text("Role of"), Inline::math("\\alpha")])]);
        assert_eq!(
            compile(&d),
            vec![Block::Heading {
                level: HeadingLevel::H3,
                rich_text: vec![RichText::text("Role of "), RichText::equation("\\alpha")],
            }]
        );
    }

    #[test]
    fn math_block_is_trimmed() {
        let d = doc(vec![AstBlock::MathBlock("  E = mc^2 \n".into())]);
        assert_eq!(
            compile(&d),
            vec![Block::Equation {
                expression: "E = mc^2".into()
            }]
        );
    }

    #[test]
    fn title_is_not_emitted() {
        let d = doc(vec![]);
        assert!(compile(&d).is_empty());
    }

    #[test]
    fn compilation_is_deterministic() {
        let d = doc(vec![
            AstBlock::Heading(vec![Inline::text("Meaning of the symbols")]),
            AstBlock::MathBlock("Q_{t+1} = Q_t + \\alpha(r_t - Q_t)".into()),
            AstBlock::Bullets(vec![vec![Inline::math("Q_t"), Inline::text(": estimate")]]),
            AstBlock::Paragraph(vec![Inline::text("Step size"), Inline::math("\\alpha"), Inline::text("matters")]),
        ]);
        assert_eq!(compile(&d), compile(&d));
        assert_eq!(compile(&d).len(), 4);
    }

    #[test]
    fn section_heading_precedes_blocks() {
        let d = doc(vec![AstBlock::Paragraph(vec![Inline::text("Recap")])]);
        let blocks = compile_section("📝 Lecture Summary", &d);
        assert_eq!(blocks[0], Block::section_heading("📝 Lecture Summary"));
        assert_eq!(blocks[0].kind(), "heading_1");
        assert_eq!(blocks.len(), 2);
    }
}
