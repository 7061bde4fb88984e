//! Anthropic adapter (Messages API).
//!
//! See: <https://docs.anthropic.com/en/api/messages>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{Adapter, CompletionStream};
use super::{http, sse};
use crate::prompt::build_prompt;
use crate::registry::{self, ModelSet};
use crate::types::{Completion, ModelRequest};
use crate::{MuninnError, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// The Messages API caps temperature at 1.0.
const MAX_TEMPERATURE: f32 = 1.0;

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicAdapter {
    api_key: String,
    http: Client,
    base_url: String,
    models: ModelSet,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create an adapter with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: http::client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            models: ModelSet::anthropic(),
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_models(mut self, models: ModelSet) -> Self {
        self.models = models;
        self
    }

    async fn post_messages(
        &self,
        request: &ModelRequest,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let prompt = build_prompt(request);
        let body = MessagesRequest {
            model: self.models.chat_model(request.model_type),
            system: &prompt.system,
            messages: prompt
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature.min(MAX_TEMPERATURE),
            stream,
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(http::transport)?;

        http::check_status(response, registry::ANTHROPIC).await
    }
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    fn name(&self) -> &str {
        registry::ANTHROPIC
    }

    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
        let response = self.post_messages(request, false).await?;
        let body: MessagesResponse = http::json(response).await?;

        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(MuninnError::EmptyResponse);
        }
        let tokens = body
            .usage
            .map(|u| u.input_tokens + u.output_tokens)
            .unwrap_or_default();

        Ok(Completion::new(
            text,
            self.models.chat_model(request.model_type),
            tokens,
        ))
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<CompletionStream> {
        let response = self.post_messages(request, true).await?;
        Ok(sse::text_deltas(response, |data| {
            let event: StreamEvent = serde_json::from_str(data)?;
            match event {
                StreamEvent::ContentBlockDelta { delta } => Ok(delta.text),
                StreamEvent::Error { error } => Err(MuninnError::Stream(error.message)),
                StreamEvent::Other => Ok(None),
            }
        }))
    }
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: TextDelta,
    },
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TextDelta {
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}
