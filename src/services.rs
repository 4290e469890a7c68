//! Collaborator traits at the edges of the pipeline.
//!
//! The orchestrator only talks to the outside world through these four
//! traits, held as `Arc<dyn Trait>`. Production implementations live in
//! [`crate::openai`], [`crate::notion`] and [`crate::pipeline::render`];
//! tests substitute in-memory fakes.

use crate::ast::Document;
use crate::blocks::Block;
use crate::error::{PipelineError, ServiceError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One part of a user turn sent to the reasoning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPart {
    Text(String),
    /// A `data:<mime>;base64,...` URL.
    Image(String),
}

/// A structured-output request against a stateful conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningRequest {
    pub conversation_id: String,
    pub model: String,
    /// System prompt with the course name already interpolated.
    pub instructions: String,
    pub input: Vec<InputPart>,
}

impl ReasoningRequest {
    /// Whether this request carries a slide image.
    pub fn has_image(&self) -> bool {
        self.input.iter().any(|p| matches!(p, InputPart::Image(_)))
    }
}

/// The stateful reasoning service (a Responses-style LLM API).
///
/// Each `respond` call appends one exchange to the conversation, so calls
/// against the same conversation must never overlap.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Open a new, empty conversation and return its id.
    async fn create_conversation(&self) -> Result<String, ServiceError>;

    /// Send one user turn and decode the structured answer.
    async fn respond(&self, request: &ReasoningRequest) -> Result<Document, ServiceError>;
}

/// The destination document service (Notion).
///
/// Each method is exactly one network call; retry and chunking are layered
/// on top by [`crate::pipeline::deliver`].
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Step 1 of an upload: create an upload handle for `filename`.
    async fn create_upload(&self, filename: &str, content_type: &str) -> Result<String, ServiceError>;

    /// Step 2 of an upload: send the file bytes against the handle.
    async fn send_upload(
        &self,
        upload_id: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), ServiceError>;

    /// Append at most 100 blocks to a page or block container.
    async fn append_children(&self, parent_id: &str, blocks: &[Block]) -> Result<(), ServiceError>;

    /// Create a page titled `title` under `parent_id` and return its id.
    async fn create_child_page(&self, parent_id: &str, title: &str) -> Result<String, ServiceError>;
}

/// PDF → ordered page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Number of pages in the document.
    async fn page_count(&self, pdf_path: &Path) -> Result<usize, PipelineError>;

    /// Render every page into `out_dir`, returning the image paths in page order.
    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PipelineError>;
}

/// Chooses which slides are uploaded without explanation.
#[async_trait]
pub trait ExclusionSelector: Send + Sync {
    /// Return the excluded 1-based page numbers, or `None` if the user aborted.
    async fn select(&self, page_images: &[PathBuf]) -> Result<Option<BTreeSet<usize>>, PipelineError>;
}

/// An [`ExclusionSelector`] that always returns the same set.
#[derive(Debug, Clone, Default)]
pub struct FixedExclusions(pub BTreeSet<usize>);

impl FixedExclusions {
    /// Parse a 1-based page list such as `2,5-7,10`. Empty input means no exclusions.
    pub fn parse(selection: &str) -> Result<Self, PipelineError> {
        let invalid = |what: &str| PipelineError::InvalidConfig(format!("Invalid slide selection '{}': {}", selection, what));
        let mut pages = BTreeSet::new();

        for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (a.trim(), b.trim()),
                None => (part, part),
            };
            let start: usize = start
                .parse()
                .map_err(|_| invalid(&format!("'{}' is not a page number", start)))?;
            let end: usize = end
                .parse()
                .map_err(|_| invalid(&format!("'{}' is not a page number", end)))?;

            if start < 1 {
                return Err(invalid("pages are 1-indexed"));
            }
            if start > end {
                return Err(invalid(&format!("range {}-{} is reversed", start, end)));
            }
            pages.extend(start..=end);
        }

        Ok(Self(pages))
    }
}

#[async_trait]
impl ExclusionSelector for FixedExclusions {
    async fn select(&self, page_images: &[PathBuf]) -> Result<Option<BTreeSet<usize>>, PipelineError> {
        let total = page_images.len();
        Ok(Some(
            self.0
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total)
                .collect(),
        ))
    }
}
