//! Semantic document tree returned by the reasoning service.
//!
//! Internally the tree is a set of true sum types ([`Inline`], [`AstBlock`])
//! with kind-specific payloads. On the wire the model must use a flat shape
//! where every block carries `inlines`, `latex` and `items` and every inline
//! carries `text` and `latex`, because strict structured-output mode requires
//! all properties to be present. The conversion between the two happens only
//! here, through serde's `from`/`into` container attributes, so the rest of
//! the crate never sees the flat shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A whole explanation: title plus ordered blocks.
///
/// The title is never compiled into a block; callers place it themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub title: String,
    pub blocks: Vec<AstBlock>,
}

/// One top-level block of the semantic tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireBlock", into = "WireBlock")]
pub enum AstBlock {
    Heading(Vec<Inline>),
    Paragraph(Vec<Inline>),
    MathBlock(String),
    Bullets(Vec<Vec<Inline>>),
    Numbered(Vec<Vec<Inline>>),
}

/// An inline span: plain text or an inline LaTeX expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireInline", into = "WireInline")]
pub enum Inline {
    Text(String),
    Math(String),
}

impl Inline {
    pub fn text(s: impl Into<String>) -> Self {
        Inline::Text(s.into())
    }

    pub fn math(latex: impl Into<String>) -> Self {
        Inline::Math(latex.into())
    }
}

// ── Wire shape ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BlockKind {
    Heading,
    Paragraph,
    MathBlock,
    Bullets,
    Numbered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum InlineKind {
    Text,
    Math,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireBlock {
    kind: BlockKind,
    inlines: Vec<Inline>,
    latex: String,
    items: Vec<Vec<Inline>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireInline {
    kind: InlineKind,
    text: String,
    latex: String,
}

impl From<WireBlock> for AstBlock {
    // Only the field that belongs to `kind` is read; the others are schema filler.
    fn from(w: WireBlock) -> Self {
        match w.kind {
            BlockKind::Heading => AstBlock::Heading(w.inlines),
            BlockKind::Paragraph => AstBlock::Paragraph(w.inlines),
            BlockKind::MathBlock => AstBlock::MathBlock(w.latex),
            BlockKind::Bullets => AstBlock::Bullets(w.items),
            BlockKind::Numbered => AstBlock::Numbered(w.items),
        }
    }
}

impl From<AstBlock> for WireBlock {
    fn from(b: AstBlock) -> Self {
        let empty = |kind| WireBlock {
            kind,
            inlines: Vec::new(),
            latex: String::new(),
            items: Vec::new(),
        };
        match b {
            AstBlock::Heading(inlines) => WireBlock {
                inlines,
                ..empty(BlockKind::Heading)
            },
            AstBlock::Paragraph(inlines) => WireBlock {
                inlines,
                ..empty(BlockKind::Paragraph)
            },
            AstBlock::MathBlock(latex) => WireBlock {
                latex,
                ..empty(BlockKind::MathBlock)
            },
            AstBlock::Bullets(items) => WireBlock {
                items,
                ..empty(BlockKind::Bullets)
            },
            AstBlock::Numbered(items) => WireBlock {
                items,
                ..empty(BlockKind::Numbered)
            },
        }
    }
}

impl From<WireInline> for Inline {
    fn from(w: WireInline) -> Self {
        match w.kind {
            InlineKind::Text => Inline::Text(w.text),
            InlineKind::Math => Inline::Math(w.latex),
        }
    }
}

impl From<Inline> for WireInline {
    fn from(i: Inline) -> Self {
        match i {
            Inline::Text(text) => WireInline {
                kind: InlineKind::Text,
                text,
                latex: String::new(),
            },
            Inline::Math(latex) => WireInline {
                kind: InlineKind::Math,
                text: String::new(),
                latex,
            },
        }
    }
}

// ── Schema ───────────────────────────────────────────────────────────────

/// Name under which the schema is registered with the structured-output API.
pub const SCHEMA_NAME: &str = "semantic_ast";

/// Strict JSON schema for [`Document`] in its wire shape.
///
/// Every object forbids additional properties and lists all of its
/// properties as required, as strict structured-output mode demands.
pub fn document_schema() -> Value {
    let inline = json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "kind": { "type": "string", "enum": ["text", "math"] },
            "text": { "type": "string" },
            "latex": { "type": "string" }
        },
        "required": ["kind", "text", "latex"]
    });

    let block = json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "kind": {
                "type": "string",
                "enum": ["heading", "paragraph", "math_block", "bullets", "numbered"]
            },
            "inlines": { "type": "array", "items": inline },
            "latex": { "type": "string" },
            "items": {
                "type": "array",
                "items": { "type": "array", "items": inline }
            }
        },
        "required": ["kind", "inlines", "latex", "items"]
    });

    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "title": { "type": "string" },
            "blocks": { "type": "array", "items": block }
        },
        "required": ["title", "blocks"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_wire_shape() {
        let raw = r#"{
            "title": "Bandits",
            "blocks": [
                {"kind": "heading", "inlines": [{"kind": "text", "text": "Update rule", "latex": ""}], "latex": "", "items": []},
                {"kind": "math_block", "inlines": [], "latex": "Q_{n+1} = Q_n + \\alpha", "items": []},
                {"kind": "bullets", "inlines": [], "latex": "", "items": [
                    [{"kind": "math", "text": "", "latex": "Q_n"}, {"kind": "text", "text": ": estimate", "latex": ""}]
                ]}
            ]
        }"#;

        let doc: Document = serde_json::from_str(raw).expect("valid AST");
        assert_eq!(doc.title, "Bandits");
        assert_eq!(
            doc.blocks,
            vec![
                AstBlock::Heading(vec![Inline::text("Update rule")]),
                AstBlock::MathBlock("Q_{n+1} = Q_n + \\alpha".into()),
                AstBlock::Bullets(vec![vec![Inline::math("Q_n"), Inline::text(": estimate")]]),
            ]
        );
    }

    #[test]
    fn inactive_fields_are_ignored() {
        let raw = r#"{"title": "", "blocks": [
            {"kind": "math_block", "inlines": [{"kind": "text", "text": "stray", "latex": ""}], "latex": "x^2", "items": []}
        ]}"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.blocks, vec![AstBlock::MathBlock("x^2".into())]);
    }

    #[test]
    fn rejects_missing_required_field() {
        let raw = r#"{"title": "t", "blocks": [{"kind": "paragraph", "inlines": [], "latex": ""}]}"#;
        let err = serde_json::from_str::<Document>(raw).unwrap_err();
        assert!(err.to_string().contains("items"), "got: {err}");
    }

    #[test]
    fn rejects_additional_properties() {
        let raw = r#"{"title": "t", "blocks": [], "extra": 1}"#;
        assert!(serde_json::from_str::<Document>(raw).is_err());

        let raw = r#"{"title": "t", "blocks": [
            {"kind": "paragraph", "inlines": [{"kind": "text", "text": "a", "latex": "", "bold": true}], "latex": "", "items": []}
        ]}"#;
        assert!(serde_json::from_str::<Document>(raw).is_err());
    }

    #[test]
    fn rejects_unknown_kind() {
        let raw = r#"{"title": "t", "blocks": [{"kind": "table", "inlines": [], "latex": "", "items": []}]}"#;
        assert!(serde_json::from_str::<Document>(raw).is_err());
    }

    #[test]
    fn serialises_back_to_flat_shape() {
        let doc = Document {
            title: "T".into(),
            blocks: vec![AstBlock::Paragraph(vec![Inline::math("x")])],
        };
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            v,
            json!({
                "title": "T",
                "blocks": [{
                    "kind": "paragraph",
                    "inlines": [{"kind": "math", "text": "", "latex": "x"}],
                    "latex": "",
                    "items": []
                }]
            })
        );
    }

    #[test]
    fn schema_is_strict_everywhere() {
        let schema = document_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        let block = &schema["properties"]["blocks"]["items"];
        assert_eq!(block["additionalProperties"], json!(false));
        assert_eq!(block["required"], json!(["kind", "inlines", "latex", "items"]));
        let inline = &block["properties"]["inlines"]["items"];
        assert_eq!(inline["required"], json!(["kind", "text", "latex"]));
    }
}
