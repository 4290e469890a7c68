//! Per-slide processing: one slide image → one ordered block group.
//!
//! For an analysed slide the upload and the explanation run concurrently,
//! since neither depends on the other; the block group is assembled only
//! once both have succeeded:
//!
//! ```text
//! image → compiled explanation blocks… → divider → empty paragraph
//! ```
//!
//! Excluded slides skip the reasoning service entirely and get just
//! `image → divider → empty paragraph`.

use crate::blocks::Block;
use crate::error::PipelineError;
use crate::output::SlideResult;
use crate::pipeline::compile::compile;
use crate::pipeline::conversation::Conversation;
use crate::pipeline::deliver::Delivery;
use futures::future::try_join;
use std::path::Path;
use tracing::debug;

/// Upload and explain one slide.
pub async fn process_slide(
    page_num: usize,
    image: &Path,
    instruction: &str,
    delivery: &Delivery,
    conversation: &mut Conversation,
) -> Result<SlideResult, PipelineError> {
    let (upload_id, doc) = try_join(
        delivery.upload_image(image),
        conversation.explain_slide(image, instruction),
    )
    .await
    .map_err(|e| slide_failed(page_num, e))?;

    let explanation = compile(&doc);
    debug!(
        "Slide {}: '{}' compiled to {} blocks",
        page_num,
        doc.title,
        explanation.len()
    );

    let mut blocks = Vec::with_capacity(explanation.len() + 3);
    blocks.push(Block::image(upload_id));
    blocks.extend(explanation);
    push_separator(&mut blocks);

    Ok(SlideResult {
        page_num,
        blocks,
        analyzed: true,
    })
}

/// Upload an excluded slide without asking for an explanation.
pub async fn upload_slide_only(
    page_num: usize,
    image: &Path,
    delivery: &Delivery,
) -> Result<SlideResult, PipelineError> {
    let upload_id = delivery
        .upload_image(image)
        .await
        .map_err(|e| slide_failed(page_num, e))?;

    let mut blocks = vec![Block::image(upload_id)];
    push_separator(&mut blocks);

    Ok(SlideResult {
        page_num,
        blocks,
        analyzed: false,
    })
}

fn push_separator(blocks: &mut Vec<Block>) {
    blocks.push(Block::Divider);
    blocks.push(Block::spacer());
}

fn slide_failed(page: usize, source: PipelineError) -> PipelineError {
    PipelineError::SlideFailed {
        page,
        source: Box::new(source),
    }
}
