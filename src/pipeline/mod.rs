//! Pipeline stages for lecture-PDF-to-Notion conversion.
//!
//! Each submodule implements one step. The orchestrator in
//! [`crate::convert`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ slide ─┬─▶ deliver (upload)
//! (check)   (pdfium)          └─▶ conversation ──▶ compile ──▶ deliver (append)
//!                                 (reasoning)      (AST → blocks)
//! ```
//!
//! 1. [`input`] - validate the PDF before anything touches the network
//! 2. [`render`] - rasterise every page to PNG; runs in `spawn_blocking`
//! 3. [`encode`] - mime inference and base64 data URLs for slide images
//! 4. [`conversation`] - the single-writer reasoning conversation
//! 5. [`compile`] - semantic AST to Notion blocks, via [`normalize`] and
//!    [`rich_text`]
//! 6. [`slide`] - one slide image to one ordered block group
//! 7. [`deliver`] - two-step image uploads and chunked appends

pub mod compile;
pub mod conversation;
pub mod deliver;
pub mod encode;
pub mod input;
pub mod normalize;
pub mod render;
pub mod rich_text;
pub mod slide;
