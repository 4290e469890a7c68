//! The lecture pipeline orchestrator.
//!
//! ## State machine
//!
//! ```text
//! Start ──▶ SlideLoop ──▶ SummaryRequest ──▶ QuestionsRequest ──▶ Delivering ──▶ Done
//!   └──────────┴───────────────┴────────────────────┴──────────────────┴──▶ Failed
//! ```
//!
//! ## Why sequential slides?
//!
//! The reasoning conversation is stateful: each explanation builds on the
//! slides before it, and the summary recaps all of them. The slide loop
//! therefore owns the [`Conversation`] exclusively and awaits each slide
//! before starting the next. Only the two independent calls *within* a
//! slide (upload, explanation) overlap.
//!
//! Nothing is appended until every slide, the summary and the questions
//! are ready, so a failure before `Delivering` leaves the page empty.

use crate::ast::{AstBlock, Document};
use crate::blocks::Block;
use crate::config::{CourseDirectory, PipelineConfig};
use crate::context::{prepare_run, PipelineContext, RunRequest};
use crate::error::PipelineError;
use crate::output::{RunReport, SlideResult};
use crate::pipeline::compile::compile_section;
use crate::pipeline::conversation::Conversation;
use crate::pipeline::deliver::Delivery;
use crate::pipeline::input::validate_pdf;
use crate::pipeline::slide::{process_slide, upload_slide_only};
use crate::progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
use crate::prompts::{system_prompt, QUESTIONS_HEADING, SUMMARY_HEADING};
use crate::services::{DocumentService, ExclusionSelector, Rasterizer, ReasoningService};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Number of practice questions requested.
pub const PRACTICE_QUESTION_COUNT: usize = 5;

/// Orchestrator states, reported through [`PipelineProgressCallback::on_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Start,
    SlideLoop,
    SummaryRequest,
    QuestionsRequest,
    Delivering,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "start",
            PipelineState::SlideLoop => "slide loop",
            PipelineState::SummaryRequest => "summary request",
            PipelineState::QuestionsRequest => "questions request",
            PipelineState::Delivering => "delivering",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Concatenate slide groups (by ascending page), then the summary and
/// questions sections, into the final block list.
pub fn assemble_blocks(mut slides: Vec<SlideResult>, summary: &Document, questions: &Document) -> Vec<Block> {
    slides.sort_by_key(|s| s.page_num);

    let mut blocks: Vec<Block> = slides.into_iter().flat_map(|s| s.blocks).collect();
    blocks.extend(compile_section(SUMMARY_HEADING, summary));
    blocks.extend(compile_section(QUESTIONS_HEADING, questions));
    blocks
}

/// Runs a prepared [`PipelineContext`] end to end.
pub struct LecturePipeline {
    rasterizer: Arc<dyn Rasterizer>,
    reasoning: Arc<dyn ReasoningService>,
    documents: Arc<dyn DocumentService>,
    config: PipelineConfig,
}

impl LecturePipeline {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        reasoning: Arc<dyn ReasoningService>,
        documents: Arc<dyn DocumentService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            rasterizer,
            reasoning,
            documents,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// See [`prepare_run`]. `Ok(None)` means the user aborted the selection.
    pub async fn prepare(
        &self,
        request: &RunRequest,
        courses: &CourseDirectory,
        selector: Option<&dyn ExclusionSelector>,
    ) -> Result<Option<PipelineContext>, PipelineError> {
        prepare_run(
            request,
            courses,
            &self.config,
            self.rasterizer.as_ref(),
            selector,
            self.reasoning.as_ref(),
            self.documents.as_ref(),
        )
        .await
    }

    /// Process every slide, generate the summary and questions, and append
    /// everything to `ctx.page_id()`.
    ///
    /// # Errors
    /// The first unrecovered error stops the run. Chunks appended before a
    /// [`PipelineError::DeliveryFailed`] stay on the page.
    pub async fn run(&self, ctx: &PipelineContext) -> Result<RunReport, PipelineError> {
        let progress: ProgressCallback = self
            .config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));

        let mut state = PipelineState::Start;
        match self.drive(ctx, progress.as_ref(), &mut state).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Run failed during {}: {}", state, e);
                progress.on_run_failed(state, &e.to_string());
                progress.on_state(PipelineState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        ctx: &PipelineContext,
        progress: &dyn PipelineProgressCallback,
        state: &mut PipelineState,
    ) -> Result<RunReport, PipelineError> {
        let total_start = Instant::now();
        enter(state, PipelineState::Start, progress);
        info!(
            "Starting run: {} → page {} (course '{}', model {})",
            ctx.pdf_path().display(),
            ctx.page_id(),
            ctx.course_name(),
            ctx.model()
        );

        // ── Start: rasterise into a scoped temp dir ──────────────────────
        validate_pdf(ctx.pdf_path())?;
        let expected_pages = self.rasterizer.page_count(ctx.pdf_path()).await?;
        let workdir = TempDir::new()
            .map_err(|e| PipelineError::Internal(format!("Failed to create temp directory: {}", e)))?;
        let images = self.rasterizer.rasterize(ctx.pdf_path(), workdir.path()).await?;
        if images.len() != expected_pages {
            warn!(
                "Rasteriser produced {} images for a {}-page PDF",
                images.len(),
                expected_pages
            );
        }
        let total_pages = images.len();
        progress.on_run_start(total_pages);

        let mut conversation = Conversation::new(
            Arc::clone(&self.reasoning),
            ctx.conversation_id(),
            ctx.model(),
            system_prompt(self.config.system_prompt.as_deref(), ctx.course_name()),
            self.config.retry.clone(),
        );
        let delivery = Delivery::new(
            Arc::clone(&self.documents),
            self.config.retry.clone(),
            self.config.chunk_size,
        );

        // ── SlideLoop ────────────────────────────────────────────────────
        enter(state, PipelineState::SlideLoop, progress);
        let slides_start = Instant::now();
        let mut slides = Vec::with_capacity(total_pages);

        for (idx, image) in images.iter().enumerate() {
            let page_num = idx + 1;
            let analyzed = !ctx.is_excluded(page_num);
            progress.on_slide_start(page_num, total_pages, analyzed);

            let result = if analyzed {
                process_slide(page_num, image, ctx.instruction(), &delivery, &mut conversation).await?
            } else {
                debug!("Slide {} excluded; uploading without explanation", page_num);
                upload_slide_only(page_num, image, &delivery).await?
            };

            info!(
                "Slide {}/{} done ({} blocks{})",
                page_num,
                total_pages,
                result.blocks.len(),
                if analyzed { "" } else { ", upload only" }
            );
            progress.on_slide_complete(page_num, idx + 1, total_pages, result.blocks.len());
            slides.push(result);
        }
        drop(workdir);

        let analyzed_slides = slides.iter().filter(|s| s.analyzed).count();
        let slides_duration_ms = slides_start.elapsed().as_millis() as u64;

        // ── SummaryRequest / QuestionsRequest ────────────────────────────
        let synthesis_start = Instant::now();
        enter(state, PipelineState::SummaryRequest, progress);
        let summary = conversation.summarize().await?;

        enter(state, PipelineState::QuestionsRequest, progress);
        let questions = conversation.exam_questions().await?;
        let synthesis_duration_ms = synthesis_start.elapsed().as_millis() as u64;

        // ── Delivering ───────────────────────────────────────────────────
        enter(state, PipelineState::Delivering, progress);
        let question_items: usize = questions
            .blocks
            .iter()
            .map(|b| match b {
                AstBlock::Numbered(items) => items.len(),
                _ => 0,
            })
            .sum();
        if question_items != PRACTICE_QUESTION_COUNT {
            warn!(
                "Expected {} numbered practice questions, got {} numbered items",
                PRACTICE_QUESTION_COUNT, question_items
            );
        }
        let blocks = assemble_blocks(slides, &summary, &questions);

        let delivery_start = Instant::now();
        let delivered = delivery.append_blocks(ctx.page_id(), &blocks, progress).await?;
        let delivery_duration_ms = delivery_start.elapsed().as_millis() as u64;

        enter(state, PipelineState::Done, progress);
        let report = RunReport {
            page_id: ctx.page_id().to_string(),
            conversation_id: conversation.id().to_string(),
            total_pages,
            analyzed_slides,
            upload_only_slides: total_pages - analyzed_slides,
            total_blocks: delivered.blocks,
            chunks: delivered.chunks,
            slides_duration_ms,
            synthesis_duration_ms,
            delivery_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Run complete: {} slides, {} blocks in {} chunks, {}ms",
            report.total_pages, report.total_blocks, report.chunks, report.total_duration_ms
        );
        progress.on_run_complete(&report);
        Ok(report)
    }
}

fn enter(state: &mut PipelineState, next: PipelineState, progress: &dyn PipelineProgressCallback) {
    debug!("State {} → {}", state, next);
    *state = next;
    info!("Pipeline state: {}", next);
    progress.on_state(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Inline;

    fn slide(page_num: usize) -> SlideResult {
        SlideResult {
            page_num,
            blocks: vec![Block::image(format!("img{page_num}")), Block::Divider, Block::spacer()],
            analyzed: true,
        }
    }

    fn doc(text: &str) -> Document {
        Document {
            title: text.into(),
            blocks: vec![AstBlock::Paragraph(vec![Inline::text(text)])],
        }
    }

    #[test]
    fn assembly_orders_slides_by_page() {
        let blocks = assemble_blocks(vec![slide(3), slide(1), slide(2)], &doc("s"), &doc("q"));
        let images: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Image { upload_id } => Some(upload_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(images, vec!["img1", "img2", "img3"]);
    }

    #[test]
    fn sections_follow_slides() {
        let blocks = assemble_blocks(vec![slide(1)], &doc("summary"), &doc("questions"));
        assert_eq!(blocks.len(), 3 + 2 + 2);
        assert_eq!(blocks[3], Block::section_heading(SUMMARY_HEADING));
        assert_eq!(blocks[5], Block::section_heading(QUESTIONS_HEADING));
    }

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::SlideLoop.is_terminal());
        assert_eq!(PipelineState::QuestionsRequest.to_string(), "questions request");
    }
}
