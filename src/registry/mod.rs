//! Model registry: default model identifiers per provider and task.
//!
//! Everything here is static configuration plus pure functions. Providers
//! carry a [`ModelSet`] that starts from these defaults and may be
//! overridden from the daemon config.

mod key;

pub use key::{CacheKeyScope, compute_cache_key};

use serde::Deserialize;

use crate::types::ModelType;

/// OpenAI provider name.
pub const OPENAI: &str = "openai";
/// Anthropic provider name.
pub const ANTHROPIC: &str = "anthropic";
/// Google Gemini provider name.
pub const GEMINI: &str = "gemini";

/// Known provider names, in default fallback order.
pub const KNOWN_PROVIDERS: &[&str] = &[GEMINI, OPENAI, ANTHROPIC];

pub const OPENAI_PRIMARY_MODEL: &str = "gpt-4o";
pub const OPENAI_CODE_MODEL: &str = "gpt-4o";
pub const OPENAI_EMBEDDINGS_MODEL: &str = "text-embedding-3-small";

pub const ANTHROPIC_PRIMARY_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const ANTHROPIC_CODE_MODEL: &str = "claude-3-7-sonnet-20250219";

pub const GEMINI_PRIMARY_MODEL: &str = "gemini-1.5-pro-002";
pub const GEMINI_CODE_MODEL: &str = "gemini-1.5-pro-002";

/// Models a single provider uses for each model class.
///
/// `embeddings` is `None` for providers without an embeddings endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSet {
    pub primary: String,
    pub code: String,
    #[serde(default)]
    pub embeddings: Option<String>,
}

impl ModelSet {
    pub fn openai() -> Self {
        Self {
            primary: OPENAI_PRIMARY_MODEL.into(),
            code: OPENAI_CODE_MODEL.into(),
            embeddings: Some(OPENAI_EMBEDDINGS_MODEL.into()),
        }
    }

    pub fn anthropic() -> Self {
        Self {
            primary: ANTHROPIC_PRIMARY_MODEL.into(),
            code: ANTHROPIC_CODE_MODEL.into(),
            embeddings: None,
        }
    }

    pub fn gemini() -> Self {
        Self {
            primary: GEMINI_PRIMARY_MODEL.into(),
            code: GEMINI_CODE_MODEL.into(),
            embeddings: None,
        }
    }

    /// Defaults for a known provider name.
    pub fn for_provider(provider: &str) -> Option<Self> {
        match provider {
            OPENAI => Some(Self::openai()),
            ANTHROPIC => Some(Self::anthropic()),
            GEMINI => Some(Self::gemini()),
            _ => None,
        }
    }

    /// Model for a request class, if this provider serves it.
    pub fn model_for(&self, model_type: ModelType) -> Option<&str> {
        match model_type {
            ModelType::Primary => Some(&self.primary),
            ModelType::Code => Some(&self.code),
            ModelType::Embeddings => self.embeddings.as_deref(),
        }
    }

    /// Chat model for a request class; anything but `code` uses primary.
    pub fn chat_model(&self, model_type: ModelType) -> &str {
        match model_type {
            ModelType::Code => &self.code,
            _ => &self.primary,
        }
    }
}

/// Model class for a free-form task tag.
///
/// `code_*` tags go to the code model, `embedding`/`similarity` to the
/// embeddings model, everything else to the primary model.
pub fn model_type_for_task(task: &str) -> ModelType {
    if task.starts_with("code_") {
        ModelType::Code
    } else if task == "embedding" || task == "similarity" {
        ModelType::Embeddings
    } else {
        ModelType::Primary
    }
}
