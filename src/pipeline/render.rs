//! PDF rasterisation: render every slide to a PNG file via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so
//! the runtime's worker threads keep driving network I/O.
//!
//! ## Why cap pixels, not DPI?
//!
//! Slide decks mix 4:3, 16:9 and the occasional A4 handout page.
//! `max_rendered_pixels` caps the longest edge regardless of physical size,
//! which keeps every image inside Notion's upload limit and within the size
//! range vision models read formulas well at.

use crate::error::PipelineError;
use crate::services::Rasterizer;
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable pointing at a pdfium shared library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Production [`Rasterizer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels: max_rendered_pixels.max(1),
        }
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn page_count(&self, pdf_path: &Path) -> Result<usize, PipelineError> {
        let path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || page_count_blocking(&path))
            .await
            .map_err(|e| PipelineError::Internal(format!("Page count task panicked: {}", e)))?
    }

    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let path = pdf_path.to_path_buf();
        let dir = out_dir.to_path_buf();
        let max_pixels = self.max_rendered_pixels;

        tokio::task::spawn_blocking(move || rasterize_blocking(&path, &dir, max_pixels))
            .await
            .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, PipelineError> {
    if let Ok(configured) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let configured = PathBuf::from(configured);
        let lib = if configured.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&configured)
        } else {
            configured
        };
        debug!("Binding pdfium from {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| PipelineError::PdfiumBindingFailed(format!("{}: {}", lib.display(), e)));
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PipelineError::PdfiumBindingFailed(e.to_string()))
}

/// File name of the rendered image for a 1-based page number.
pub fn page_image_name(page_num: usize) -> String {
    format!("page_{page_num}.png")
}

fn open_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, PipelineError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| PipelineError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

fn page_count_blocking(pdf_path: &Path) -> Result<usize, PipelineError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path)?;
    Ok(document.pages().len() as usize)
}

fn rasterize_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    max_pixels: u32,
) -> Result<Vec<PathBuf>, PipelineError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut paths = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let failed = |detail: String| PipelineError::RasterisationFailed {
            page: page_num,
            detail,
        };

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("{:?}", e)))?;
        let image = bitmap.as_image();

        let path = out_dir.join(page_image_name(page_num));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| failed(format!("saving {}: {}", path.display(), e)))?;

        debug!(
            "Rendered page {} → {}x{} px at {}",
            page_num,
            image.width(),
            image.height(),
            path.display()
        );
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_images_are_named_by_page_number() {
        assert_eq!(page_image_name(1), "page_1.png");
        assert_eq!(page_image_name(12), "page_12.png");
    }

    #[test]
    fn zero_pixel_cap_is_clamped() {
        let r = PdfiumRasterizer::new(0);
        assert_eq!(r.max_rendered_pixels, 1);
        assert_eq!(PdfiumRasterizer::default().max_rendered_pixels, 2000);
    }
}
