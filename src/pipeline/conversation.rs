//! The stateful reasoning conversation for one run.
//!
//! A [`Conversation`] is the single writer for its conversation id: every
//! method takes `&mut self`, so two requests against the same conversation
//! can never be in flight at once. Slide explanations, the summary and the
//! practice questions all land in the same conversation, which is what lets
//! the model build on earlier slides and recap the whole lecture at the end.

use crate::ast::Document;
use crate::config::RetryPolicy;
use crate::error::PipelineError;
use crate::pipeline::encode::image_data_url;
use crate::prompts::{QUESTIONS_REQUEST, SUMMARY_REQUEST};
use crate::retry::with_retry;
use crate::services::{InputPart, ReasoningRequest, ReasoningService};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const SLIDE_REQUEST: &str = "slide explanation";
pub const SUMMARY_REQUEST_NAME: &str = "summary";
pub const QUESTIONS_REQUEST_NAME: &str = "practice questions";

pub struct Conversation {
    service: Arc<dyn ReasoningService>,
    id: String,
    model: String,
    instructions: String,
    retry: RetryPolicy,
    exchanges: usize,
}

impl Conversation {
    /// Wrap an already-created conversation id.
    pub fn new(
        service: Arc<dyn ReasoningService>,
        id: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            id: id.into(),
            model: model.into(),
            instructions: instructions.into(),
            retry,
            exchanges: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of successful exchanges so far.
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    /// Ask for an explanation of one slide image.
    pub async fn explain_slide(&mut self, image: &Path, instruction: &str) -> Result<Document, PipelineError> {
        let data_url = image_data_url(image)
            .await
            .map_err(|source| PipelineError::Reasoning {
                request: SLIDE_REQUEST,
                source,
            })?;

        self.send(
            SLIDE_REQUEST,
            vec![InputPart::Text(instruction.to_string()), InputPart::Image(data_url)],
        )
        .await
    }

    /// Ask for the whole-lecture summary.
    pub async fn summarize(&mut self) -> Result<Document, PipelineError> {
        self.send(SUMMARY_REQUEST_NAME, vec![InputPart::Text(SUMMARY_REQUEST.to_string())])
            .await
    }

    /// Ask for the five practice questions.
    pub async fn exam_questions(&mut self) -> Result<Document, PipelineError> {
        self.send(QUESTIONS_REQUEST_NAME, vec![InputPart::Text(QUESTIONS_REQUEST.to_string())])
            .await
    }

    async fn send(&mut self, request: &'static str, input: Vec<InputPart>) -> Result<Document, PipelineError> {
        let req = ReasoningRequest {
            conversation_id: self.id.clone(),
            model: self.model.clone(),
            instructions: self.instructions.clone(),
            input,
        };

        debug!("Sending {} request to conversation {}", request, self.id);
        let service = Arc::clone(&self.service);
        let doc = with_retry(&self.retry, request, || service.respond(&req))
            .await
            .map_err(|source| PipelineError::Reasoning { request, source })?;

        self.exchanges += 1;
        info!(
            "{} received: '{}' ({} blocks)",
            request,
            doc.title,
            doc.blocks.len()
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBlock, Inline};
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<ReasoningRequest>>,
        fail_first: Mutex<u32>,
    }

    #[async_trait]
    impl ReasoningService for Recorder {
        async fn create_conversation(&self) -> Result<String, ServiceError> {
            Ok("conv_test".into())
        }

        async fn respond(&self, request: &ReasoningRequest) -> Result<Document, ServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut fails = self.fail_first.lock().unwrap();
            if *fails > 0 {
                *fails -= 1;
                return Err(ServiceError::Status {
                    service: "openai",
                    status: 503,
                    body: "overloaded".into(),
                });
            }
            Ok(Document {
                title: "Answer".into(),
                blocks: vec![AstBlock::Paragraph(vec![Inline::text("ok")])],
            })
        }
    }

    fn conversation(service: Arc<Recorder>) -> Conversation {
        Conversation::new(service, "conv_test", "gpt-test", "be a tutor", RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn slide_request_carries_instruction_and_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("page_1.png");
        std::fs::write(&image, [0u8; 4]).unwrap();

        let service = Arc::new(Recorder::default());
        let mut conv = conversation(Arc::clone(&service));
        conv.explain_slide(&image, "explain please").await.unwrap();

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.conversation_id, "conv_test");
        assert_eq!(req.model, "gpt-test");
        assert_eq!(req.instructions, "be a tutor");
        assert_eq!(req.input[0], InputPart::Text("explain please".into()));
        assert!(req.has_image());
    }

    #[tokio::test]
    async fn summary_and_questions_are_text_only() {
        let service = Arc::new(Recorder::default());
        let mut conv = conversation(Arc::clone(&service));
        conv.summarize().await.unwrap();
        conv.exam_questions().await.unwrap();

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| !r.has_image()));
        assert_eq!(requests[0].input, vec![InputPart::Text(SUMMARY_REQUEST.into())]);
        assert_eq!(requests[1].input, vec![InputPart::Text(QUESTIONS_REQUEST.into())]);
        assert_eq!(conv.exchanges(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let service = Arc::new(Recorder::default());
        *service.fail_first.lock().unwrap() = 2;
        let mut conv = conversation(Arc::clone(&service));
        conv.summarize().await.unwrap();
        assert_eq!(service.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_reasoning_error() {
        let service = Arc::new(Recorder::default());
        *service.fail_first.lock().unwrap() = 5;
        let mut conv = conversation(Arc::clone(&service));
        let err = conv.exam_questions().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Reasoning { request: QUESTIONS_REQUEST_NAME, .. }
        ));
        assert_eq!(conv.exchanges(), 0);
    }

    #[tokio::test]
    async fn unreadable_image_fails_without_a_request() {
        let service = Arc::new(Recorder::default());
        let mut conv = conversation(Arc::clone(&service));
        let err = conv
            .explain_slide(Path::new("/missing/page_1.png"), "explain")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Reasoning { .. }));
        assert!(service.requests.lock().unwrap().is_empty());
    }
}
