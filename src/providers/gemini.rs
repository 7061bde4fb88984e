//! Google Gemini adapter (Generative Language API).
//!
//! See: <https://ai.google.dev/api/generate-content>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{Adapter, CompletionStream};
use super::{http, sse};
use crate::prompt::build_prompt;
use crate::registry::{self, ModelSet};
use crate::types::{Completion, ModelRequest, Role};
use crate::{MuninnError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini API.
#[derive(Clone)]
pub struct GeminiAdapter {
    api_key: String,
    http: Client,
    base_url: String,
    models: ModelSet,
}

impl GeminiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create an adapter with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: http::client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            models: ModelSet::gemini(),
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

    async fn post(&self, request: &ModelRequest, method: &str) -> Result<reqwest::Response> {
        let prompt = build_prompt(request);
        let body = GenerateRequest {
            contents: prompt
                .messages
                .iter()
                .map(|m| Content {
                    // Gemini calls the assistant side "model".
                    role: match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    },
                    parts: vec![Part { text: &m.content }],
                })
                .collect(),
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: &prompt.system,
                }],
            },
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let model = self.models.chat_model(request.model_type);
        let response = self
            .http
            .post(format!("{}/v1beta/models/{model}:{method}", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::transport)?;

        http::check_status(response, registry::GEMINI).await
    }
}

#[async_trait]
impl Adapter for GeminiAdapter {
    fn name(&self) -> &str {
        registry::GEMINI
    }

    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
        let response = self.post(request, "generateContent").await?;
        let body: GenerateResponse = http::json(response).await?;

        let tokens = body
            .usage_metadata
            .as_ref()
            .map(|u| u.total_token_count)
            .unwrap_or_default();
        let text = body.text();
        if text.is_empty() {
            return Err(MuninnError::EmptyResponse);
        }

        Ok(Completion::new(
            text,
            self.models.chat_model(request.model_type),
            tokens,
        ))
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<CompletionStream> {
        let response = self.post(request, "streamGenerateContent?alt=sse").await?;
        Ok(sse::text_deltas(response, |data| {
            let chunk: GenerateResponse = serde_json::from_str(data)?;
            Ok(Some(chunk.text()))
        }))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: SystemInstruction<'a>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}
