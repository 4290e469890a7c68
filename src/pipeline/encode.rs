//! Slide image encoding: file on disk → mime type and base64 data URL.
//!
//! The Responses API accepts images inline as `data:` URLs, so analysed
//! slides never need a public URL. Notion uploads use the same mime
//! inference for the `content_type` of the upload handle.

use crate::error::ServiceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Fallback for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Infer a mime type from the file extension (case-insensitive).
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    }
}

/// The file name component used for upload handles.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slide".to_string())
}

/// Wrap raw bytes as a `data:<mime>;base64,...` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Read an image file and encode it as a data URL.
pub async fn image_data_url(path: &Path) -> Result<String, ServiceError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let url = data_url(mime_for_path(path), &bytes);
    debug!("Encoded {} → {} bytes data URL", path.display(), url.len());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_path(Path::new("page_1.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("page_1.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("page_1.jpeg")), "image/jpeg");
    }

    #[test]
    fn unknown_extension_defaults_to_octet_stream() {
        assert_eq!(mime_for_path(Path::new("slide.xyz")), OCTET_STREAM);
        assert_eq!(mime_for_path(Path::new("slide")), OCTET_STREAM);
    }

    #[test]
    fn data_url_shape() {
        assert_eq!(data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn file_name_of_path() {
        assert_eq!(file_name(&PathBuf::from("/tmp/x/page_3.png")), "page_3.png");
    }

    #[tokio::test]
    async fn reads_file_into_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let url = image_data_url(&path).await.unwrap();
        assert_eq!(url, "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = image_data_url(Path::new("/definitely/not/here.png")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Io { .. }));
        assert!(!err.is_retryable());
    }
}
