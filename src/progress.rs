//! Progress-callback trait for per-slide and per-stage run events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the deck, generates the summary and
//! questions, and appends chunks to Notion.
//!
//! # Example
//!
//! ```rust
//! use edgequake_lecture2notion::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, page_num: usize, completed: usize, total_pages: usize, _blocks: usize) {
//!         self.completed.store(completed, Ordering::SeqCst);
//!         eprintln!("Slide {page_num} done ({completed}/{total_pages})");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::convert::PipelineState;
use crate::output::RunReport;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// Slides are processed strictly one at a time, so slide events arrive in
/// page order and `completed` grows by exactly one per slide. All methods
/// have default no-op implementations.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once the deck is rasterised and the page count is known.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called whenever the orchestrator enters a new state.
    fn on_state(&self, state: PipelineState) {
        let _ = state;
    }

    /// Called just before a slide is dispatched.
    ///
    /// # Arguments
    /// * `page_num` - 1-indexed page number
    /// * `analyzed` - false for excluded (upload-only) slides
    fn on_slide_start(&self, page_num: usize, total_pages: usize, analyzed: bool) {
        let _ = (page_num, total_pages, analyzed);
    }

    /// Called when a slide's block group is assembled.
    ///
    /// # Arguments
    /// * `completed` - slides finished so far, including this one
    /// * `blocks`    - size of the slide's block group
    fn on_slide_complete(&self, page_num: usize, completed: usize, total_pages: usize, blocks: usize) {
        let _ = (page_num, completed, total_pages, blocks);
    }

    /// Called after each append chunk is accepted by Notion.
    ///
    /// # Arguments
    /// * `chunk` - 1-indexed chunk number
    fn on_chunk_appended(&self, chunk: usize, total_chunks: usize, blocks: usize) {
        let _ = (chunk, total_chunks, blocks);
    }

    /// Called once after the final chunk is appended.
    fn on_run_complete(&self, report: &RunReport) {
        let _ = report;
    }

    /// Called once when the run stops on an unrecovered error.
    fn on_run_failed(&self, state: PipelineState, error: &str) {
        let _ = (state, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
