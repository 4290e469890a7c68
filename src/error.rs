//! Error types for the edgequake-lecture2notion library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`ServiceError`] - a single call to an external service (Notion, the
//!   reasoning model) failed. It carries enough detail for the retry
//!   executor to decide whether another attempt can help
//!   ([`ServiceError::is_retryable`]).
//!
//! * [`PipelineError`] - **Fatal**: the run stops. Every unrecovered
//!   `ServiceError` ends up wrapped in one of these, tagged with the stage
//!   that produced it. There is no partial-success return value: a run either
//!   appends the whole deck or stops at the first unrecoverable failure.

use std::path::PathBuf;
use thiserror::Error;

/// A failed call to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The exchange broke off at the transport level: DNS, connect, TLS,
    /// timeout, or a response body cut short.
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status code.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but the payload was not what we expected
    /// (missing ids, malformed JSON, AST that violates the schema).
    #[error("{service} returned an unexpected payload: {detail}")]
    InvalidResponse {
        service: &'static str,
        detail: String,
    },

    /// The model declined to answer.
    #[error("{service} refused the request: {message}")]
    Refusal {
        service: &'static str,
        message: String,
    },

    /// A local file needed for the call could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    /// Build a [`ServiceError::Transport`] from a reqwest error.
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { service, source }
    }

    /// Whether another attempt at the same call could plausibly succeed.
    ///
    /// Retryable: connection/timeout failures, truncated bodies, 408, 409 (Notion's
    /// `conflict_error`), 429 and every 5xx. Everything else is permanent:
    /// auth and validation 4xx, malformed payloads, refusals, local I/O.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Transport { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.is_request()
                    || source.is_body()
                    || source.is_decode()
            }
            ServiceError::Status { status, .. } => {
                matches!(*status, 408 | 409 | 429) || *status >= 500
            }
            ServiceError::InvalidResponse { .. }
            | ServiceError::Refusal { .. }
            | ServiceError::Io { .. } => false,
        }
    }
}

/// All fatal errors returned by the edgequake-lecture2notion library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium failed to render or save a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// No destination page is mapped for the requested course.
    #[error("No Notion page mapped for course '{course}'.\nAdd {env_key}=<page id> to the environment.")]
    CourseNotMapped { course: String, env_key: String },

    /// A required credential is absent.
    #[error("Missing credential {name}.\n{hint}")]
    MissingCredential { name: &'static str, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Stage errors ──────────────────────────────────────────────────────
    /// Creating the destination page failed.
    #[error("Failed to create page '{title}': {source}")]
    PageCreation {
        title: String,
        #[source]
        source: ServiceError,
    },

    /// Opening a reasoning-service conversation failed.
    #[error("Failed to open a conversation: {source}")]
    ConversationCreation {
        #[source]
        source: ServiceError,
    },

    /// Uploading a slide image failed after all retries.
    #[error("Image upload failed for '{path}': {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: ServiceError,
    },

    /// A reasoning-service request failed after all retries.
    #[error("{request} request failed: {source}")]
    Reasoning {
        request: &'static str,
        #[source]
        source: ServiceError,
    },

    /// A slide could not be processed; the run stops here.
    #[error("Slide {page} failed: {source}")]
    SlideFailed {
        page: usize,
        #[source]
        source: Box<PipelineError>,
    },

    /// An append chunk failed; earlier chunks stay on the page.
    #[error(
        "Append failed on chunk {chunk}/{total_chunks} ({appended_blocks} blocks already appended): {source}"
    )]
    DeliveryFailed {
        chunk: usize,
        total_chunks: usize,
        appended_blocks: usize,
        #[source]
        source: ServiceError,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ServiceError {
        ServiceError::Status {
            service: "notion",
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        for code in [408, 409, 429, 500, 502, 503] {
            assert!(status(code).is_retryable(), "{code} should be retryable");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for code in [400, 401, 403, 404, 422] {
            assert!(!status(code).is_retryable(), "{code} should be permanent");
        }
    }

    #[test]
    fn invalid_payload_is_permanent() {
        let e = ServiceError::InvalidResponse {
            service: "openai",
            detail: "missing field `blocks`".into(),
        };
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn delivery_failure_display() {
        let e = PipelineError::DeliveryFailed {
            chunk: 2,
            total_chunks: 3,
            appended_blocks: 50,
            source: status(400),
        };
        let msg = e.to_string();
        assert!(msg.contains("2/3"), "got: {msg}");
        assert!(msg.contains("50 blocks"), "got: {msg}");
    }

    #[test]
    fn course_not_mapped_names_env_key() {
        let e = PipelineError::CourseNotMapped {
            course: "Machine Learning".into(),
            env_key: "NOTION_PAGE_MACHINE_LEARNING".into(),
        };
        assert!(e.to_string().contains("NOTION_PAGE_MACHINE_LEARNING"));
    }

    #[test]
    fn slide_failure_wraps_stage_error() {
        let e = PipelineError::SlideFailed {
            page: 4,
            source: Box::new(PipelineError::Reasoning {
                request: "slide explanation",
                source: status(500),
            }),
        };
        let msg = e.to_string();
        assert!(msg.contains("Slide 4"));
        assert!(msg.contains("HTTP 500"));
    }
}
