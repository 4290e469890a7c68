//! OpenAI Responses API client implementing [`ReasoningService`].
//!
//! Every turn is sent with `conversation` set, so the service keeps the
//! history server-side, and with a strict `json_schema` text format so the
//! answer always decodes into a [`Document`].

use crate::ast::{document_schema, Document, SCHEMA_NAME};
use crate::error::{PipelineError, ServiceError};
use crate::services::{InputPart, ReasoningRequest, ReasoningService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

const SERVICE: &str = "openai";

/// Reasoning over a slide with a large model can take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    conversation: &'a str,
    instructions: &'a str,
    input: Vec<UserMessage<'a>>,
    text: TextFormat,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    InputText { text: &'a str },
    InputImage { image_url: &'a str },
}

#[derive(Debug, Serialize)]
struct TextFormat {
    format: Value,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputContent {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

/// Client for the Responses and Conversations endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at another deployment (or a mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, PipelineError> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PipelineError::MissingCredential {
                name: API_KEY_ENV,
                hint: "Create a key at https://platform.openai.com/api-keys and export OPENAI_API_KEY."
                    .to_string(),
            })?;
        let client = Self::new(key)?;
        Ok(match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, path: &str, body: &impl Serialize) -> Result<T, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE,
            detail: format!("{} response: {}", path, e),
        })
    }
}

/// Build the structured-output request body for one turn.
fn build_request(request: &ReasoningRequest) -> ResponsesRequest<'_> {
    let content = request
        .input
        .iter()
        .map(|part| match part {
            InputPart::Text(text) => ContentPart::InputText { text },
            InputPart::Image(url) => ContentPart::InputImage { image_url: url },
        })
        .collect();

    ResponsesRequest {
        model: &request.model,
        conversation: &request.conversation_id,
        instructions: &request.instructions,
        input: vec![UserMessage {
            role: "user",
            content,
        }],
        text: TextFormat {
            format: json!({
                "type": "json_schema",
                "name": SCHEMA_NAME,
                "strict": true,
                "schema": document_schema(),
            }),
        },
    }
}

/// Concatenate every `output_text` part of every message; surface refusals.
fn extract_output_text(resp: &ResponsesResponse) -> Result<String, ServiceError> {
    let mut text = String::new();
    for item in resp.output.iter().filter(|i| i.kind == "message") {
        for part in &item.content {
            match part {
                OutputContent::OutputText { text: t } => text.push_str(t),
                OutputContent::Refusal { refusal } => {
                    return Err(ServiceError::Refusal {
                        service: SERVICE,
                        message: refusal.clone(),
                    })
                }
                OutputContent::Other => {}
            }
        }
    }

    if text.is_empty() {
        return Err(ServiceError::InvalidResponse {
            service: SERVICE,
            detail: format!(
                "no output_text in response (status: {})",
                resp.status.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(text)
}

#[async_trait]
impl ReasoningService for OpenAiClient {
    async fn create_conversation(&self) -> Result<String, ServiceError> {
        let created: CreatedObject = self.post_json("/conversations", &json!({})).await?;
        debug!("Created conversation {}", created.id);
        Ok(created.id)
    }

    async fn respond(&self, request: &ReasoningRequest) -> Result<Document, ServiceError> {
        let body = build_request(request);
        let resp: ResponsesResponse = self.post_json("/responses", &body).await?;
        let text = extract_output_text(&resp)?;
        debug!("Response text: {} chars", text.len());

        serde_json::from_str(&text).map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE,
            detail: format!("answer does not match the document schema: {}", e),
        })
    }
}
