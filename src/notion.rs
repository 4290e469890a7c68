//! Notion REST client implementing [`DocumentService`].
//!
//! | Operation          | Endpoint                                   |
//! |--------------------|--------------------------------------------|
//! | create upload      | `POST /v1/file_uploads`                    |
//! | send upload        | `POST /v1/file_uploads/{id}/send` (multipart `file`) |
//! | append children    | `PATCH /v1/blocks/{id}/children`           |
//! | create child page  | `POST /v1/pages`                           |

use crate::blocks::Block;
use crate::error::{PipelineError, ServiceError};
use crate::services::DocumentService;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
pub const API_KEY_ENV: &str = "NOTION_API_KEY";
pub const BASE_URL_ENV: &str = "NOTION_BASE_URL";

const SERVICE: &str = "notion";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl NotionClient {
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

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from `NOTION_API_KEY` and optional `NOTION_BASE_URL`.
    pub fn from_env() -> Result<Self, PipelineError> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PipelineError::MissingCredential {
                name: API_KEY_ENV,
                hint: "Create an internal integration at https://www.notion.so/my-integrations, \
share the course pages with it, and export NOTION_API_KEY."
                    .to_string(),
            })?;
        let client = Self::new(key)?;
        Ok(match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(&self, what: &str, builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let resp = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!("Notion {} failed with HTTP {}: {}", what, status, body);
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn created_id(what: &str, resp: reqwest::Response) -> Result<String, ServiceError> {
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        serde_json::from_slice::<CreatedObject>(&bytes)
            .map(|o| o.id)
            .map_err(|e| ServiceError::InvalidResponse {
                service: SERVICE,
                detail: format!("{} response without an id: {}", what, e),
            })
    }
}

#[async_trait]
impl DocumentService for NotionClient {
    async fn create_upload(&self, filename: &str, content_type: &str) -> Result<String, ServiceError> {
        let url = format!("{}/file_uploads", self.base_url);
        let req = self
            .http
            .post(url)
            .json(&json!({ "filename": filename, "content_type": content_type }));
        let resp = self.send("create upload", req).await?;
        Self::created_id("create upload", resp).await
    }

    async fn send_upload(
        &self,
        upload_id: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), ServiceError> {
        let url = format!("{}/file_uploads/{}/send", self.base_url, upload_id);
        let part = Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| ServiceError::InvalidResponse {
                service: SERVICE,
                detail: format!("invalid content type '{}': {}", content_type, e),
            })?;
        let req = self.http.post(url).multipart(Form::new().part("file", part));
        self.send("send upload", req).await?;
        Ok(())
    }

    async fn append_children(&self, parent_id: &str, blocks: &[Block]) -> Result<(), ServiceError> {
        let url = format!("{}/blocks/{}/children", self.base_url, parent_id);
        let req = self.http.patch(url).json(&json!({ "children": blocks }));
        self.send("append children", req).await?;
        debug!("Appended {} blocks to {}", blocks.len(), parent_id);
        Ok(())
    }

    async fn create_child_page(&self, parent_id: &str, title: &str) -> Result<String, ServiceError> {
        let url = format!("{}/pages", self.base_url);
        let req = self.http.post(url).json(&json!({
            "parent": { "page_id": parent_id },
            "properties": {
                "title": { "title": [{ "text": { "content": title } }] }
            }
        }));
        let resp = self.send("create page", req).await?;
        Self::created_id("create page", resp).await
    }
}
