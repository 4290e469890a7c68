//! Run preparation and the immutable per-run context.
//!
//! [`prepare_run`] turns a [`RunRequest`] into a [`PipelineContext`]:
//!
//! 1. validate the PDF and resolve the course page (no network yet)
//! 2. optionally let the user pick slides to upload without explanation;
//!    aborting here returns `Ok(None)` before anything is created remotely
//! 3. create a child page titled after the PDF under the course page
//! 4. open a fresh reasoning conversation
//!
//! The resulting context is never mutated; the orchestrator only reads it.

use crate::config::{CourseDirectory, PipelineConfig};
use crate::error::PipelineError;
use crate::pipeline::input::{lecture_title, validate_pdf};
use crate::prompts::SLIDE_INSTRUCTION;
use crate::retry::with_retry;
use crate::services::{DocumentService, ExclusionSelector, Rasterizer, ReasoningService};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub pdf_path: PathBuf,
    pub course_name: String,
    /// Overrides the configured slide instruction for this run.
    pub instruction: Option<String>,
}

impl RunRequest {
    pub fn new(pdf_path: impl Into<PathBuf>, course_name: impl Into<String>) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            course_name: course_name.into(),
            instruction: None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }
}

/// Immutable configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineContext {
    pdf_path: PathBuf,
    course_name: String,
    instruction: String,
    page_id: String,
    conversation_id: String,
    excluded_pages: BTreeSet<usize>,
    model: String,
}

impl PipelineContext {
    /// A context with no excluded pages, the default instruction and the default model.
    pub fn new(
        pdf_path: impl Into<PathBuf>,
        course_name: impl Into<String>,
        page_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            course_name: course_name.into(),
            instruction: SLIDE_INSTRUCTION.to_string(),
            page_id: page_id.into(),
            conversation_id: conversation_id.into(),
            excluded_pages: BTreeSet::new(),
            model: crate::config::DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_excluded_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.excluded_pages = pages.into_iter().collect();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    pub fn course_name(&self) -> &str {
        &self.course_name
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// The page blocks are appended to.
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn excluded_pages(&self) -> &BTreeSet<usize> {
        &self.excluded_pages
    }

    /// Whether a 1-based page is uploaded without explanation.
    pub fn is_excluded(&self, page_num: usize) -> bool {
        self.excluded_pages.contains(&page_num)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Resolve, select, and create everything a run needs.
///
/// Returns `Ok(None)` when the selector aborts; no remote state exists at that point.
pub async fn prepare_run(
    request: &RunRequest,
    courses: &CourseDirectory,
    config: &PipelineConfig,
    rasterizer: &dyn Rasterizer,
    selector: Option<&dyn ExclusionSelector>,
    reasoning: &dyn ReasoningService,
    documents: &dyn DocumentService,
) -> Result<Option<PipelineContext>, PipelineError> {
    validate_pdf(&request.pdf_path)?;
    let course_page = courses.resolve(&request.course_name)?;
    debug!("Course '{}' maps to page {}", request.course_name, course_page);

    let excluded = match selector {
        Some(selector) => match select_exclusions(&request.pdf_path, rasterizer, selector).await? {
            Some(set) => set,
            None => {
                info!("Slide selection aborted; nothing was created");
                return Ok(None);
            }
        },
        None => BTreeSet::new(),
    };

    let title = lecture_title(&request.pdf_path);
    let page_id = with_retry(&config.retry, "create page", || {
        documents.create_child_page(course_page, &title)
    })
    .await
    .map_err(|source| PipelineError::PageCreation {
        title: title.clone(),
        source,
    })?;
    info!("Created page '{}' ({}) under course '{}'", title, page_id, request.course_name);

    let conversation_id = with_retry(&config.retry, "create conversation", || {
        reasoning.create_conversation()
    })
    .await
    .map_err(|source| PipelineError::ConversationCreation { source })?;
    info!("Opened conversation {}", conversation_id);

    let instruction = request
        .instruction
        .clone()
        .or_else(|| config.instruction.clone())
        .unwrap_or_else(|| SLIDE_INSTRUCTION.to_string());

    Ok(Some(
        PipelineContext::new(&request.pdf_path, &request.course_name, page_id, conversation_id)
            .with_excluded_pages(excluded)
            .with_instruction(instruction)
            .with_model(&config.model),
    ))
}

/// Render a preview of the deck and ask the selector which slides to exclude.
async fn select_exclusions(
    pdf_path: &Path,
    rasterizer: &dyn Rasterizer,
    selector: &dyn ExclusionSelector,
) -> Result<Option<BTreeSet<usize>>, PipelineError> {
    let preview = TempDir::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create preview directory: {}", e)))?;
    let images = rasterizer.rasterize(pdf_path, preview.path()).await?;
    let selected = selector.select(&images).await?;
    if let Some(ref set) = selected {
        debug!("Excluded slides: {:?}", set);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Document;
    use crate::blocks::Block;
    use crate::config::RetryPolicy;
    use crate::error::ServiceError;
    use crate::services::{FixedExclusions, ReasoningRequest};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Remote {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReasoningService for Remote {
        async fn create_conversation(&self) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push("conversation".into());
            Ok("conv_1".into())
        }

        async fn respond(&self, _: &ReasoningRequest) -> Result<Document, ServiceError> {
            unreachable!("prepare_run never sends a turn")
        }
    }

    #[async_trait]
    impl DocumentService for Remote {
        async fn create_upload(&self, _: &str, _: &str) -> Result<String, ServiceError> {
            unreachable!()
        }

        async fn send_upload(&self, _: &str, _: &str, _: &str, _: &[u8]) -> Result<(), ServiceError> {
            unreachable!()
        }

        async fn append_children(&self, _: &str, _: &[Block]) -> Result<(), ServiceError> {
            unreachable!()
        }

        async fn create_child_page(&self, parent_id: &str, title: &str) -> Result<String, ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("page {parent_id} {title}"));
            Ok("page_1".into())
        }
    }

    struct ThreePages;

    #[async_trait]
    impl Rasterizer for ThreePages {
        async fn page_count(&self, _: &Path) -> Result<usize, PipelineError> {
            Ok(3)
        }

        async fn rasterize(&self, _: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
            Ok((1..=3).map(|i| out_dir.join(format!("page_{i}.png"))).collect())
        }
    }

    struct Abort;

    #[async_trait]
    impl ExclusionSelector for Abort {
        async fn select(&self, _: &[PathBuf]) -> Result<Option<BTreeSet<usize>>, PipelineError> {
            Ok(None)
        }
    }

    fn pdf(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("Lecture 3.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        path
    }

    fn config() -> PipelineConfig {
        PipelineConfig::builder()
            .model("gpt-test")
            .retry(RetryPolicy::immediate(1))
            .build()
            .unwrap()
    }

    fn courses() -> CourseDirectory {
        CourseDirectory::from_pairs([("Algorithms", "course_page")])
    }

    #[tokio::test]
    async fn builds_context_with_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Remote::default();
        let selector = FixedExclusions([2].into_iter().collect());
        let request = RunRequest::new(pdf(&dir), "algorithms");

        let ctx = prepare_run(
            &request,
            &courses(),
            &config(),
            &ThreePages,
            Some(&selector),
            &remote,
            &remote,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(ctx.page_id(), "page_1");
        assert_eq!(ctx.conversation_id(), "conv_1");
        assert_eq!(ctx.model(), "gpt-test");
        assert!(ctx.is_excluded(2));
        assert!(!ctx.is_excluded(1));
        assert_eq!(ctx.instruction(), SLIDE_INSTRUCTION);
        assert_eq!(
            *remote.calls.lock().unwrap(),
            vec!["page course_page Lecture 3".to_string(), "conversation".to_string()]
        );
    }

    #[tokio::test]
    async fn abort_makes_no_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Remote::default();
        let request = RunRequest::new(pdf(&dir), "Algorithms");

        let ctx = prepare_run(&request, &courses(), &config(), &ThreePages, Some(&Abort), &remote, &remote)
            .await
            .unwrap();

        assert!(ctx.is_none());
        assert!(remote.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmapped_course_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Remote::default();
        let request = RunRequest::new(pdf(&dir), "Compilers");

        let err = prepare_run(&request, &courses(), &config(), &ThreePages, None, &remote, &remote)
            .await
            .unwrap_err();

        match err {
            PipelineError::CourseNotMapped { env_key, .. } => assert_eq!(env_key, "NOTION_PAGE_COMPILERS"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(remote.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_instruction_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Remote::default();
        let request = RunRequest::new(pdf(&dir), "Algorithms").with_instruction("Only the formulas");

        let ctx = prepare_run(&request, &courses(), &config(), &ThreePages, None, &remote, &remote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.instruction(), "Only the formulas");
        assert!(ctx.excluded_pages().is_empty());
    }
}
