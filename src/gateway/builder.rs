//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use super::Gateway;
use crate::cache::{CacheConfig, EmbeddingCache, ResponseCache};
use crate::providers::{
    Adapter, AnthropicAdapter, DEFAULT_STREAM_BUFFER, GeminiAdapter, OpenAiAdapter,
    ProviderRegistry, RetryConfig,
};
use crate::registry::CacheKeyScope;
use crate::{MuninnError, Result};

/// Default deadline for a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Main entry point for creating gateway instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// Providers are tried in the order they are added, starting from the
/// default provider when one is set.
///
/// ```rust,no_run
/// # use muninn::Muninn;
/// # use std::time::Duration;
/// let gateway = Muninn::builder()
///     .gemini("gemini-key")
///     .openai("openai-key")
///     .default_provider("openai")
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok::<(), muninn::MuninnError>(())
/// ```
pub struct MuninnBuilder {
    http: reqwest::Client,
    adapters: Vec<Arc<dyn Adapter>>,
    default_provider: Option<String>,
    retry: Option<RetryConfig>,
    cache: CacheConfig,
    embedding_cache: CacheConfig,
    key_scope: CacheKeyScope,
    call_timeout: Duration,
    stream_buffer_size: usize,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            http: crate::providers::http_client(),
            adapters: Vec::new(),
            default_provider: None,
            retry: None,
            cache: CacheConfig::default(),
            embedding_cache: CacheConfig::default(),
            key_scope: CacheKeyScope::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            stream_buffer_size: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Configure the OpenAI provider with default models.
    pub fn openai(self, api_key: impl Into<String>) -> Self {
        let adapter = OpenAiAdapter::new(api_key).with_http_client(self.http.clone());
        self.adapter(Arc::new(adapter))
    }

    /// Configure the Anthropic provider with default models.
    pub fn anthropic(self, api_key: impl Into<String>) -> Self {
        let adapter = AnthropicAdapter::new(api_key).with_http_client(self.http.clone());
        self.adapter(Arc::new(adapter))
    }

    /// Configure the Gemini provider with default models.
    pub fn gemini(self, api_key: impl Into<String>) -> Self {
        let adapter = GeminiAdapter::new(api_key).with_http_client(self.http.clone());
        self.adapter(Arc::new(adapter))
    }

    /// Register any adapter (custom endpoint or models, or a test double).
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// The shared HTTP client, for constructing adapters by hand.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Provider tried first when a request has no override.
    /// Default: the first provider added.
    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    /// Retry transient errors inside each provider before falling back.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn response_cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn embedding_cache(mut self, config: CacheConfig) -> Self {
        self.embedding_cache = config;
        self
    }

    /// Which request fields form the response cache key.
    pub fn cache_key_scope(mut self, scope: CacheKeyScope) -> Self {
        self.key_scope = scope;
        self
    }

    /// Deadline for each provider call. Default: 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Deltas buffered between a provider stream and its consumer.
    pub fn stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size;
        self
    }

    /// Build the gateway.
    ///
    /// A gateway with no providers is valid; every routed request then
    /// returns the degraded response.
    pub fn build(self) -> Result<Gateway> {
        if self.stream_buffer_size == 0 {
            return Err(MuninnError::Configuration(
                "stream buffer size must be at least 1".into(),
            ));
        }

        let mut registry = ProviderRegistry::new();
        if let Some(config) = self.retry {
            registry.set_retry_config(config);
        }
        for adapter in self.adapters {
            registry.add(adapter);
        }

        if let Some(name) = &self.default_provider
            && !registry.contains(name)
        {
            return Err(MuninnError::Configuration(format!(
                "default provider '{name}' is not configured"
            )));
        }

        Ok(Gateway::new(
            registry,
            self.default_provider,
            ResponseCache::new(&self.cache),
            EmbeddingCache::new(&self.embedding_cache),
            self.key_scope,
            self.call_timeout,
            self.stream_buffer_size,
        ))
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
