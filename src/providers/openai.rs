//! OpenAI adapter: chat completions and embeddings.
//!
//! See: <https://platform.openai.com/docs/api-reference/chat>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{Adapter, CompletionStream};
use super::{http, sse};
use crate::prompt::build_prompt;
use crate::registry::{self, ModelSet};
use crate::types::{Completion, Embedding, ModelRequest};
use crate::{MuninnError, Result};

/// Default base URL for the OpenAI API.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI API.
///
/// Serves primary and code requests through chat completions, and is the
/// only built-in adapter with an embeddings model.
#[derive(Clone)]
pub struct OpenAiAdapter {
    api_key: String,
    http: Client,
    base_url: String,
    models: ModelSet,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create an adapter with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: http::client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            models: ModelSet::openai(),
        }
    }

    /// Share an existing HTTP client (connection pool) with other adapters.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Override the default models.
    pub fn with_models(mut self, models: ModelSet) -> Self {
        self.models = models;
        self
    }

    async fn post_chat(&self, request: &ModelRequest, stream: bool) -> Result<reqwest::Response> {
        let prompt = build_prompt(request);
        let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: &prompt.system,
        });
        messages.extend(prompt.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let body = ChatRequest {
            model: self.models.chat_model(request.model_type),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::transport)?;

        http::check_status(response, registry::OPENAI).await
    }
}

#[async_trait]
impl Adapter for OpenAiAdapter {
    fn name(&self) -> &str {
        registry::OPENAI
    }

    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
        let response = self.post_chat(request, false).await?;
        let body: ChatResponse = http::json(response).await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(MuninnError::EmptyResponse)?;
        let tokens = body.usage.map(|u| u.total_tokens).unwrap_or_default();

        Ok(Completion::new(
            text,
            self.models.chat_model(request.model_type),
            tokens,
        ))
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<CompletionStream> {
        let response = self.post_chat(request, true).await?;
        Ok(sse::text_deltas(response, |data| {
            let chunk: StreamChunk = serde_json::from_str(data)?;
            Ok(chunk.choices.into_iter().next().and_then(|c| c.delta.content))
        }))
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self
            .models
            .embeddings
            .as_deref()
            .ok_or_else(|| MuninnError::Unsupported {
                provider: registry::OPENAI.to_string(),
                operation: "embeddings",
            })?;

        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model, input: text })
            .send()
            .await
            .map_err(http::transport)?;
        let response = http::check_status(response, registry::OPENAI).await?;

        let body: EmbeddingResponse = http::json(response).await?;
        let values = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(MuninnError::EmptyResponse)?;

        Ok(Embedding {
            dimensions: values.len(),
            values,
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
