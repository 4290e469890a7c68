//! Result types produced by the pipeline stages and the orchestrator.

use crate::blocks::Block;
use serde::{Deserialize, Serialize};

/// One slide's contribution to the page: its block group, tagged with the page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Image, explanation (analysed slides only), divider, spacer.
    pub blocks: Vec<Block>,
    /// False for excluded slides that were only uploaded.
    pub analyzed: bool,
}

/// Outcome of a chunked append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Append requests issued, all successful.
    pub chunks: usize,
    /// Blocks appended in total.
    pub blocks: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Destination page the blocks were appended to.
    pub page_id: String,
    /// Reasoning-service conversation used for the run.
    pub conversation_id: String,
    /// Pages in the PDF.
    pub total_pages: usize,
    /// Slides sent to the reasoning service.
    pub analyzed_slides: usize,
    /// Excluded slides that were uploaded without explanation.
    pub upload_only_slides: usize,
    /// Blocks appended, including section headings.
    pub total_blocks: usize,
    /// Append requests issued.
    pub chunks: usize,
    /// Wall-clock time spent on slides.
    pub slides_duration_ms: u64,
    /// Wall-clock time spent on summary and practice questions.
    pub synthesis_duration_ms: u64,
    /// Wall-clock time spent appending.
    pub delivery_duration_ms: u64,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
}
