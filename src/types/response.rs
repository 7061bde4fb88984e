//! Response types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::MuninnError;

/// `modelUsed` marker for a failed call.
pub const ERROR_MODEL: &str = "error";

/// Apology returned when every configured provider failed.
pub const EXHAUSTED_MESSAGE: &str = "I apologize, but I encountered an error processing your request. This could be due to API limits, connectivity issues, or other technical problems. Please try again or try using a different model provider.";

/// Normalized gateway response.
///
/// `model_used == "error"` marks a degraded response: the text is a
/// user-displayable explanation and must be shown, not retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    pub text: String,
    pub model_used: String,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

impl ModelResponse {
    /// Degraded response carrying `text` for the user.
    pub fn error(text: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            text: text.into(),
            model_used: ERROR_MODEL.to_string(),
            tokens_used: 0,
            latency_ms,
        }
    }

    /// Flatten an adapter failure into the sentinel shape.
    pub fn from_error(err: &MuninnError) -> Self {
        Self::error(err.user_message(), 0)
    }

    /// Terminal response after all providers failed.
    pub fn exhausted(latency_ms: u64) -> Self {
        Self::error(EXHAUSTED_MESSAGE, latency_ms)
    }

    pub fn is_error(&self) -> bool {
        self.model_used == ERROR_MODEL
    }
}

/// What an adapter produces before the router stamps latency on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub tokens_used: u32,
}

impl Completion {
    pub fn new(text: impl Into<String>, model: impl Into<String>, tokens_used: u32) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            tokens_used,
        }
    }

    pub fn into_response(self, latency_ms: u64) -> ModelResponse {
        ModelResponse {
            text: self.text,
            model_used: self.model,
            tokens_used: self.tokens_used,
            latency_ms,
        }
    }
}

/// A text embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

/// Credential-derived availability, as served by `/api/llm/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Some available provider serves primary requests.
    pub primary: bool,
    /// Some available provider serves code requests.
    pub code: bool,
    /// Some available provider serves embeddings.
    pub embeddings: bool,
    /// Availability per known provider name.
    pub providers: BTreeMap<String, bool>,
}
