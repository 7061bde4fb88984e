//! Muninn error types

use std::time::Duration;

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider has no model for the requested capability.
    /// The router treats this like any other failure and moves on.
    #[error("provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,
}

impl MuninnError {
    /// Whether a retry of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MuninnError::RateLimited { .. }
            | MuninnError::Http(_)
            | MuninnError::Timeout(_)
            | MuninnError::Stream(_)
            | MuninnError::EmptyResponse => true,
            MuninnError::Api { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    /// Provider-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuninnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Human-readable explanation of the failure category.
    ///
    /// This is the text placed in a degraded `ModelResponse` when an
    /// adapter call fails, so it never leaks keys or raw provider bodies.
    pub fn user_message(&self) -> String {
        match self {
            MuninnError::RateLimited { .. } => "I apologize, but the AI provider is currently rate limiting requests. Please wait a moment and try again.".to_string(),
            MuninnError::AuthenticationFailed => "I apologize, but the AI provider rejected our credentials. Please check that the API key is properly configured.".to_string(),
            MuninnError::Http(_) | MuninnError::Timeout(_) | MuninnError::Stream(_) => "I apologize, but I could not reach the AI provider. This could be due to connectivity issues. Please try again later.".to_string(),
            MuninnError::MalformedResponse(_) | MuninnError::Json(_) | MuninnError::EmptyResponse => "I apologize, but the AI provider returned a response I could not understand. Please try again or switch to a different model.".to_string(),
            MuninnError::Unsupported { provider, operation } => format!(
                "I apologize, but the {provider} provider does not support {operation}. Please try a different model provider."
            ),
            MuninnError::NoProvider | MuninnError::UnknownProvider(_) => "No AI provider is configured. Please check your API key configuration.".to_string(),
            _ => "I apologize, but I encountered an error while processing your request. Please try again or try using a different model provider.".to_string(),
        }
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
