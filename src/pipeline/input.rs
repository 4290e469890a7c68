//! Input validation: make sure the lecture PDF exists, is readable, and is a PDF.
//!
//! Checked before any network call so a typo in the path never leaves an
//! empty page behind in Notion. We validate the PDF magic bytes (`%PDF`)
//! so callers get a meaningful error rather than a pdfium failure.

use crate::error::PipelineError;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Validate that `path` points at a readable PDF file.
pub fn validate_pdf(path: &Path) -> Result<(), PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(PipelineError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(PipelineError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF input: {}", path.display());
    Ok(())
}

/// Page title derived from the PDF file name without its extension.
pub fn lecture_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Lecture".to_string())
}
