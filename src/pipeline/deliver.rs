//! Notion delivery: slide image uploads and chunked block appends.
//!
//! Every network call is wrapped in [`with_retry`] on its own, so a flaky
//! second upload step retries just that step and a failing chunk retries
//! just that chunk. Chunks go out strictly in order; the first chunk that
//! fails after all retries aborts the rest, leaving the earlier chunks on
//! the page.

use crate::blocks::Block;
use crate::config::RetryPolicy;
use crate::error::{PipelineError, ServiceError};
use crate::output::DeliveryReport;
use crate::pipeline::encode::{file_name, mime_for_path};
use crate::progress::PipelineProgressCallback;
use crate::retry::with_retry;
use crate::services::DocumentService;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Split `blocks` into consecutive slices of at most `size` blocks.
pub fn chunked(blocks: &[Block], size: usize) -> std::slice::Chunks<'_, Block> {
    blocks.chunks(size.max(1))
}

pub struct Delivery {
    documents: Arc<dyn DocumentService>,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl Delivery {
    pub fn new(documents: Arc<dyn DocumentService>, retry: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            documents,
            retry,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upload one slide image and return the upload id to reference from an image block.
    pub async fn upload_image(&self, path: &Path) -> Result<String, PipelineError> {
        let upload_failed = |source| PipelineError::Upload {
            path: path.to_path_buf(),
            source,
        };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ServiceError::Io {
                path: path.to_path_buf(),
                source,
            })
            .map_err(upload_failed)?;
        let filename = file_name(path);
        let content_type = mime_for_path(path);
        let docs = Arc::clone(&self.documents);

        let upload_id = with_retry(&self.retry, "create upload", || {
            docs.create_upload(&filename, content_type)
        })
        .await
        .map_err(upload_failed)?;

        with_retry(&self.retry, "send upload", || {
            docs.send_upload(&upload_id, &filename, content_type, &bytes)
        })
        .await
        .map_err(upload_failed)?;

        debug!("Uploaded {} as {} ({} bytes)", filename, upload_id, bytes.len());
        Ok(upload_id)
    }

    /// Append `blocks` under `parent_id` in chunks of `chunk_size`, in order.
    pub async fn append_blocks(
        &self,
        parent_id: &str,
        blocks: &[Block],
        progress: &dyn PipelineProgressCallback,
    ) -> Result<DeliveryReport, PipelineError> {
        let total_chunks = blocks.len().div_ceil(self.chunk_size);
        let docs = Arc::clone(&self.documents);
        let mut appended = 0;

        for (idx, chunk) in chunked(blocks, self.chunk_size).enumerate() {
            let chunk_num = idx + 1;
            let operation = format!("append chunk {chunk_num}/{total_chunks}");

            with_retry(&self.retry, &operation, || docs.append_children(parent_id, chunk))
                .await
                .map_err(|source| PipelineError::DeliveryFailed {
                    chunk: chunk_num,
                    total_chunks,
                    appended_blocks: appended,
                    source,
                })?;

            appended += chunk.len();
            debug!("Appended chunk {}/{} ({} blocks)", chunk_num, total_chunks, chunk.len());
            progress.on_chunk_appended(chunk_num, total_chunks, chunk.len());
        }

        info!("Appended {} blocks in {} chunks to {}", appended, total_chunks, parent_id);
        Ok(DeliveryReport {
            chunks: total_chunks,
            blocks: appended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNotion {
        appends: Mutex<Vec<usize>>,
        fail_append_at: Option<(usize, u16)>,
        send_failures: Mutex<u32>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentService for FakeNotion {
        async fn create_upload(&self, filename: &str, content_type: &str) -> Result<String, ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {filename} {content_type}"));
            Ok(format!("upload-{filename}"))
        }

        async fn send_upload(
            &self,
            upload_id: &str,
            _filename: &str,
            _content_type: &str,
            bytes: &[u8],
        ) -> Result<(), ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("send {upload_id} {}", bytes.len()));
            let mut failures = self.send_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ServiceError::Status {
                    service: "notion",
                    status: 502,
                    body: String::new(),
                });
            }
            Ok(())
        }

        async fn append_children(&self, _parent_id: &str, blocks: &[Block]) -> Result<(), ServiceError> {
            let mut appends = self.appends.lock().unwrap();
            let call = appends.len() + 1;
            if let Some((at, status)) = self.fail_append_at {
                if call == at {
                    appends.push(0);
                    return Err(ServiceError::Status {
                        service: "notion",
                        status,
                        body: "validation_error".into(),
                    });
                }
            }
            appends.push(blocks.len());
            Ok(())
        }

        async fn create_child_page(&self, _parent_id: &str, _title: &str) -> Result<String, ServiceError> {
            Ok("page".into())
        }
    }

    fn blocks(n: usize) -> Vec<Block> {
        (0..n).map(|_| Block::Divider).collect()
    }

    #[tokio::test]
    async fn appends_in_chunks_of_fifty() {
        let fake = Arc::new(FakeNotion::default());
        let delivery = Delivery::new(fake.clone(), RetryPolicy::immediate(3), 50);
        let report = delivery
            .append_blocks("page", &blocks(120), &NoopProgressCallback)
            .await
            .unwrap();

        assert_eq!(*fake.appends.lock().unwrap(), vec![50, 50, 20]);
        assert_eq!(report, DeliveryReport { chunks: 3, blocks: 120 });
    }

    #[tokio::test]
    async fn exact_multiple_has_no_empty_trailing_chunk() {
        let fake = Arc::new(FakeNotion::default());
        let delivery = Delivery::new(fake.clone(), RetryPolicy::immediate(3), 50);
        delivery
            .append_blocks("page", &blocks(100), &NoopProgressCallback)
            .await
            .unwrap();
        assert_eq!(*fake.appends.lock().unwrap(), vec![50, 50]);
    }

    #[tokio::test]
    async fn failed_chunk_aborts_remaining_chunks() {
        let fake = Arc::new(FakeNotion {
            fail_append_at: Some((2, 400)),
            ..Default::default()
        });
        let delivery = Delivery::new(fake.clone(), RetryPolicy::immediate(3), 50);
        let err = delivery
            .append_blocks("page", &blocks(120), &NoopProgressCallback)
            .await
            .unwrap_err();

        match err {
            PipelineError::DeliveryFailed {
                chunk,
                total_chunks,
                appended_blocks,
                ..
            } => {
                assert_eq!((chunk, total_chunks, appended_blocks), (2, 3, 50));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Permanent 400: one attempt at chunk 2, never a third chunk.
        assert_eq!(fake.appends.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upload_retries_only_the_failing_step() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("page_4.png");
        std::fs::write(&image, [9u8; 16]).unwrap();

        let fake = Arc::new(FakeNotion::default());
        *fake.send_failures.lock().unwrap() = 1;
        let delivery = Delivery::new(fake.clone(), RetryPolicy::immediate(3), 50);

        let id = delivery.upload_image(&image).await.unwrap();
        assert_eq!(id, "upload-page_4.png");
        assert_eq!(
            *fake.calls.lock().unwrap(),
            vec![
                "create page_4.png image/png".to_string(),
                "send upload-page_4.png 16".to_string(),
                "send upload-page_4.png 16".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_image_is_an_upload_error() {
        let fake = Arc::new(FakeNotion::default());
        let delivery = Delivery::new(fake.clone(), RetryPolicy::immediate(3), 50);
        let err = delivery.upload_image(Path::new("/nope/page_1.png")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload { .. }));
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        assert_eq!(chunked(&blocks(3), 0).count(), 3);
    }
}
