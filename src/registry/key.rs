//! Content-addressed cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ModelRequest, ModelType};

/// Which request fields take part in the cache key.
///
/// `Request` (the default) hashes only `modelType`, `prompt`, `maxTokens`
/// and `temperature`, so the same prompt served by different providers
/// shares one entry. `Provider` additionally folds in the explicit
/// `context.provider` override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKeyScope {
    #[default]
    Request,
    Provider,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyFields<'a> {
    model_type: ModelType,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'a str>,
}

/// Hex SHA-256 over the canonical JSON of the keyed request fields.
///
/// Field order is fixed by the struct layout, so two requests that differ
/// only in context (or in key order inside context) hash identically.
pub fn compute_cache_key(request: &ModelRequest, scope: CacheKeyScope) -> String {
    let fields = KeyFields {
        model_type: request.model_type,
        prompt: &request.prompt,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        provider: match scope {
            CacheKeyScope::Request => None,
            CacheKeyScope::Provider => request.provider_override(),
        },
    };
    // Serializing a struct of plain fields cannot fail.
    let canonical = serde_json::to_vec(&fields).unwrap_or_default();
    format!("{:x}", Sha256::digest(&canonical))
}
