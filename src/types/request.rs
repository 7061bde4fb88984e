//! Gateway request types

use serde::{Deserialize, Serialize};

use super::context::RequestContext;
use crate::{MuninnError, Result};

/// Default completion budget when the caller does not specify one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature when the caller does not specify one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Highest temperature accepted by any configured provider.
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Model class a request is routed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Primary,
    Code,
    Embeddings,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Primary => "primary",
            ModelType::Code => "code",
            ModelType::Embeddings => "embeddings",
        }
    }
}

/// Task tag used to pick system-prompt phrasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    CodeCompletion,
    CodeExplanation,
    #[default]
    General,
}

impl TaskType {
    /// Parse a task tag. Unknown tags map to [`TaskType::General`].
    pub fn parse(tag: &str) -> Self {
        match tag {
            "code_generation" => TaskType::CodeGeneration,
            "code_completion" => TaskType::CodeCompletion,
            "code_explanation" => TaskType::CodeExplanation,
            _ => TaskType::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeGeneration => "code_generation",
            TaskType::CodeCompletion => "code_completion",
            TaskType::CodeExplanation => "code_explanation",
            TaskType::General => "general",
        }
    }
}

/// A provider-agnostic completion request.
///
/// Field names follow the chat UI's JSON (`modelType`, `maxTokens`).
/// Missing `modelType`, `maxTokens` and `temperature` take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    pub prompt: String,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl ModelRequest {
    /// Create a primary-model request with default limits.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_type: ModelType::default(),
            context: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Explicit provider override carried in the context, if any.
    pub fn provider_override(&self) -> Option<&str> {
        self.context.as_ref().and_then(RequestContext::provider)
    }

    /// Task type hint carried in the context, defaulting to `general`.
    pub fn task_type(&self) -> TaskType {
        self.context
            .as_ref()
            .map(RequestContext::task_type)
            .unwrap_or_default()
    }

    /// Reject requests that no provider could serve.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(MuninnError::InvalidInput("prompt cannot be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(MuninnError::InvalidInput(
                "maxTokens must be at least 1".into(),
            ));
        }
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(MuninnError::InvalidInput(format!(
                "temperature must be between 0 and {MAX_TEMPERATURE}, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}
