//! Destination blocks: the subset of the Notion block model this crate emits.
//!
//! Blocks serialise to the exact JSON objects accepted by
//! `PATCH /v1/blocks/{id}/children`, e.g.
//!
//! ```json
//! {"object": "block", "type": "heading_3", "heading_3": {"rich_text": [...]}}
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// One rich-text segment inside a text-bearing block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichText {
    Text { text: TextContent },
    Equation { equation: EquationContent },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquationContent {
    pub expression: String,
}

impl RichText {
    pub fn text(content: impl Into<String>) -> Self {
        RichText::Text {
            text: TextContent {
                content: content.into(),
            },
        }
    }

    pub fn equation(expression: impl Into<String>) -> Self {
        RichText::Equation {
            equation: EquationContent {
                expression: expression.into(),
            },
        }
    }
}

/// Heading level. AST headings use `H3`; section titles use `H1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    H1,
    H3,
}

/// A block appended to the destination page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Image referencing a completed file upload.
    Image { upload_id: String },
    Heading {
        level: HeadingLevel,
        rich_text: Vec<RichText>,
    },
    Paragraph { rich_text: Vec<RichText> },
    Equation { expression: String },
    BulletedListItem { rich_text: Vec<RichText> },
    NumberedListItem { rich_text: Vec<RichText> },
    Divider,
}

impl Block {
    /// An image block for an uploaded asset.
    pub fn image(upload_id: impl Into<String>) -> Self {
        Block::Image {
            upload_id: upload_id.into(),
        }
    }

    /// A level-1 heading holding a single plain-text segment.
    pub fn section_heading(title: &str) -> Self {
        Block::Heading {
            level: HeadingLevel::H1,
            rich_text: vec![RichText::text(title)],
        }
    }

    /// An empty paragraph, used as vertical space after a slide.
    pub fn spacer() -> Self {
        Block::Paragraph {
            rich_text: Vec::new(),
        }
    }

    /// The Notion `type` discriminator for this block.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Image { .. } => "image",
            Block::Heading {
                level: HeadingLevel::H1,
                ..
            } => "heading_1",
            Block::Heading {
                level: HeadingLevel::H3,
                ..
            } => "heading_3",
            Block::Paragraph { .. } => "paragraph",
            Block::Equation { .. } => "equation",
            Block::BulletedListItem { .. } => "bulleted_list_item",
            Block::NumberedListItem { .. } => "numbered_list_item",
            Block::Divider => "divider",
        }
    }
}

#[derive(Serialize)]
struct RichTextBody<'a> {
    rich_text: &'a [RichText],
}

#[derive(Serialize)]
struct FileUploadRef<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct ImageBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    file_upload: FileUploadRef<'a>,
}

#[derive(Serialize)]
struct EquationBody<'a> {
    expression: &'a str,
}

#[derive(Serialize)]
struct EmptyBody {}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.kind();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("object", "block")?;
        map.serialize_entry("type", kind)?;
        match self {
            Block::Image { upload_id } => map.serialize_entry(
                kind,
                &ImageBody {
                    kind: "file_upload",
                    file_upload: FileUploadRef { id: upload_id },
                },
            )?,
            Block::Heading { rich_text, .. }
            | Block::Paragraph { rich_text }
            | Block::BulletedListItem { rich_text }
            | Block::NumberedListItem { rich_text } => {
                map.serialize_entry(kind, &RichTextBody { rich_text })?
            }
            Block::Equation { expression } => {
                map.serialize_entry(kind, &EquationBody { expression })?
            }
            Block::Divider => map.serialize_entry(kind, &EmptyBody {})?,
        }
        map.end()
    }
}
