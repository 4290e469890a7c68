//! # edgequake-lecture2notion
//!
//! Turn a lecture slide deck (PDF) into an annotated Notion study page.
//!
//! ## Why this crate?
//!
//! Lecture slides are terse: a formula, three bullets, a plot. Studying
//! from them means reconstructing what the lecturer said. This crate
//! rasterises each slide, asks a vision-capable reasoning model to explain
//! it inside one long-lived conversation (so later slides build on earlier
//! ones), then asks the same conversation for a lecture summary and five
//! practice questions. Everything lands on a fresh Notion page under the
//! course page, slide images included, with LaTeX rendered as Notion
//! equations.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Prepare   course page lookup, slide exclusions, child page, conversation
//!  ├─ 2. Render    rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Slides    per slide, strictly in order: upload ∥ explain → blocks
//!  ├─ 4. Synthesis lecture summary, then 5 practice questions
//!  └─ 5. Deliver   append all blocks in chunks of 50
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_lecture2notion::{
//!     CourseDirectory, LecturePipeline, NotionClient, OpenAiClient, PdfiumRasterizer,
//!     PipelineConfig, RunRequest,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let pipeline = LecturePipeline::new(
//!         Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels)),
//!         Arc::new(OpenAiClient::from_env()?),
//!         Arc::new(NotionClient::from_env()?),
//!         config,
//!     );
//!
//!     // NOTION_PAGE_ALGORITHMS=<page id> maps the course to its Notion page.
//!     let courses = CourseDirectory::from_env();
//!     let request = RunRequest::new("lecture-04.pdf", "Algorithms");
//!     if let Some(ctx) = pipeline.prepare(&request, &courses, None).await? {
//!         let report = pipeline.run(&ctx).await?;
//!         eprintln!("{} blocks appended to {}", report.total_blocks, report.page_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lecture2notion` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-lecture2notion = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ast;
pub mod blocks;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod notion;
pub mod openai;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ast::{AstBlock, Document, Inline};
pub use blocks::{Block, HeadingLevel, RichText};
pub use config::{CourseDirectory, PipelineConfig, PipelineConfigBuilder, RetryPolicy, RetryScope};
pub use context::{prepare_run, PipelineContext, RunRequest};
pub use convert::{LecturePipeline, PipelineState};
pub use error::{PipelineError, ServiceError};
pub use notion::NotionClient;
pub use openai::OpenAiClient;
pub use output::{DeliveryReport, RunReport, SlideResult};
pub use pipeline::render::PdfiumRasterizer;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use services::{
    DocumentService, ExclusionSelector, FixedExclusions, InputPart, Rasterizer, ReasoningRequest,
    ReasoningService,
};
