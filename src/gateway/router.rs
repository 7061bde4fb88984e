//! The gateway router.
//!
//! A routed completion goes through
//! `check cache → select provider → call adapter → cache and return`,
//! falling back through the remaining providers on failure:
//!
//! ```text
//!   request ──► cache hit? ──yes──► cached response
//!                  │ no
//!                  ▼
//!        start = override ∨ default ∨ first
//!                  │
//!                  ▼
//!   ┌──► invoke(adapter) ──ok──► stamp latency ──► cache ──► response
//!   │          │ error
//!   │          ▼
//!   └── next in rotation (at most N attempts) ──exhausted──► apology
//! ```
//!
//! The rotation cursor is local to each call. The only shared mutable
//! routing state is the default provider name, which fallback never
//! touches.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures_util::stream;
use tracing::{debug, info, instrument, warn};

use crate::cache::{EmbeddingCache, ResponseCache};
use crate::providers::{self, CompletionStream, ProviderRegistry};
use crate::registry::{CacheKeyScope, KNOWN_PROVIDERS, compute_cache_key};
use crate::telemetry;
use crate::types::{
    EXHAUSTED_MESSAGE, Embedding, ModelRequest, ModelResponse, ModelType, ProviderStatus,
};
use crate::{MuninnError, Result};

/// Routes requests across providers with caching and fallback.
///
/// Built with [`Muninn::builder()`](super::Muninn::builder). Share it
/// behind an `Arc`; every method takes `&self`.
pub struct Gateway {
    providers: ProviderRegistry,
    default_provider: RwLock<Option<String>>,
    cache: ResponseCache,
    embedding_cache: EmbeddingCache,
    key_scope: CacheKeyScope,
    call_timeout: Duration,
    stream_buffer_size: usize,
}

impl Gateway {
    pub(crate) fn new(
        providers: ProviderRegistry,
        default_provider: Option<String>,
        cache: ResponseCache,
        embedding_cache: EmbeddingCache,
        key_scope: CacheKeyScope,
        call_timeout: Duration,
        stream_buffer_size: usize,
    ) -> Self {
        Self {
            providers,
            default_provider: RwLock::new(default_provider),
            cache,
            embedding_cache,
            key_scope,
            call_timeout,
            stream_buffer_size,
        }
    }

    // ========================================================================
    // Completions
    // ========================================================================

    /// Route a request to a provider, never failing.
    ///
    /// A cache hit is returned as stored, including its original latency.
    /// Otherwise at most one call per registered provider is made; if all
    /// fail (or none are registered) the result is the apology response
    /// with `modelUsed == "error"`. Only successful responses are cached.
    #[instrument(
        skip_all,
        fields(model_type = request.model_type.as_str(), prompt_len = request.prompt.len())
    )]
    pub async fn route_request(&self, request: &ModelRequest) -> ModelResponse {
        let key = compute_cache_key(request, self.key_scope);
        if let Some(hit) = self.cache.get(&key) {
            debug!(model = %hit.model_used, "serving cached response");
            return hit;
        }

        let start = Instant::now();
        let mut previous: Option<&str> = None;
        for adapter in self.providers.rotation(self.start_index(request)) {
            let name = adapter.name();
            if let Some(from) = previous {
                Self::record_fallback(from, request.model_type);
                info!(from, to = name, "falling back to next provider");
            }

            let call_start = Instant::now();
            let mut response =
                providers::invoke(adapter.as_ref(), request, self.call_timeout).await;
            Self::record_request("complete", name, call_start, !response.is_error());

            if !response.is_error() {
                response.latency_ms = elapsed_ms(start);
                Self::record_tokens(name, response.tokens_used);
                self.cache.set(key, response.clone());
                info!(
                    provider = name,
                    model = %response.model_used,
                    tokens = response.tokens_used,
                    latency_ms = response.latency_ms,
                    "request served"
                );
                return response;
            }
            previous = Some(name);
        }

        warn!(
            providers = self.providers.len(),
            "all providers failed, returning degraded response"
        );
        ModelResponse::exhausted(elapsed_ms(start))
    }

    /// Stream a completion as text deltas.
    ///
    /// Provider selection matches [`route_request`](Self::route_request),
    /// but fallback only covers opening the stream: once deltas flow, a
    /// failure surfaces as an `Err` item. If no provider connects, the
    /// stream yields the apology text as its only item. Streams bypass the
    /// cache.
    #[instrument(
        skip_all,
        fields(model_type = request.model_type.as_str(), prompt_len = request.prompt.len())
    )]
    pub async fn stream_request(&self, request: &ModelRequest) -> CompletionStream {
        let mut previous: Option<&str> = None;
        for adapter in self.providers.rotation(self.start_index(request)) {
            let name = adapter.name();
            if let Some(from) = previous {
                Self::record_fallback(from, request.model_type);
            }

            let call_start = Instant::now();
            match providers::open_stream(adapter.as_ref(), request, self.call_timeout).await {
                Ok(stream) => {
                    Self::record_request("stream", name, call_start, true);
                    debug!(provider = name, "stream opened");
                    return providers::bounded_stream(stream, self.stream_buffer_size);
                }
                Err(e) => {
                    Self::record_request("stream", name, call_start, false);
                    warn!(provider = name, error = %e, "failed to open stream");
                    previous = Some(name);
                }
            }
        }

        warn!("no provider could open a stream");
        Box::pin(stream::once(async { Ok(EXHAUSTED_MESSAGE.to_string()) }))
    }

    // ========================================================================
    // Embeddings
    // ========================================================================

    /// Embed a text through the first provider that supports embeddings.
    ///
    /// Providers without an embeddings model fail with `Unsupported` and
    /// the walk moves on. Results are memoised per text.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        if let Some(hit) = self.embedding_cache.get(text).await {
            return Ok(hit);
        }

        let mut last_err = None;
        for adapter in self.providers.rotation(self.default_index()) {
            let name = adapter.name();
            let call_start = Instant::now();
            let result = tokio::time::timeout(self.call_timeout, adapter.embed(text))
                .await
                .unwrap_or(Err(MuninnError::Timeout(self.call_timeout)));
            match result {
                Ok(embedding) => {
                    Self::record_request("embed", name, call_start, true);
                    self.embedding_cache.insert(text, embedding.clone()).await;
                    return Ok(embedding);
                }
                Err(e @ MuninnError::Unsupported { .. }) => {
                    debug!(provider = name, "no embeddings model, skipping");
                    last_err = Some(e);
                }
                Err(e) => {
                    Self::record_request("embed", name, call_start, false);
                    warn!(provider = name, error = %e, "embedding failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(MuninnError::NoProvider))
    }

    // ========================================================================
    // Provider state
    // ========================================================================

    /// Credential-derived availability. No provider is contacted.
    pub fn status(&self) -> ProviderStatus {
        let mut status = ProviderStatus::default();
        for name in KNOWN_PROVIDERS {
            status.providers.insert((*name).to_string(), false);
        }
        for adapter in self.providers.iter() {
            let models = adapter.models();
            status.providers.insert(adapter.name().to_string(), true);
            status.primary |= models.model_for(ModelType::Primary).is_some();
            status.code |= models.model_for(ModelType::Code).is_some();
            status.embeddings |= models.model_for(ModelType::Embeddings).is_some();
        }
        status
    }

    /// The provider tried first when a request carries no override.
    pub fn default_provider(&self) -> Option<String> {
        let configured = self
            .default_provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        configured.or_else(|| self.providers.names().first().map(|n| n.to_string()))
    }

    /// Change the default provider. The name must be registered.
    pub fn set_default_provider(&self, name: &str) -> Result<()> {
        if !self.providers.contains(name) {
            return Err(MuninnError::UnknownProvider(name.to_string()));
        }
        *self
            .default_provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
        info!(provider = name, "default provider changed");
        Ok(())
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn response_cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn embedding_cache(&self) -> &EmbeddingCache {
        &self.embedding_cache
    }

    pub fn cache_key_scope(&self) -> CacheKeyScope {
        self.key_scope
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Rotation start: a registered override wins over the default.
    fn start_index(&self, request: &ModelRequest) -> usize {
        if let Some(name) = request.provider_override() {
            match self.providers.position(name) {
                Some(idx) => return idx,
                None => warn!(provider = name, "override names an unavailable provider"),
            }
        }
        self.default_index()
    }

    fn default_index(&self) -> usize {
        self.default_provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .and_then(|name| self.providers.position(name))
            .unwrap_or(0)
    }

    fn record_request(operation: &'static str, provider: &str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        let elapsed = start.elapsed().as_secs_f64();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider.to_owned(),
            "operation" => operation,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider.to_owned(),
            "operation" => operation,
        )
        .record(elapsed);
    }

    fn record_fallback(from: &str, model_type: ModelType) {
        metrics::counter!(telemetry::FALLBACKS_TOTAL,
            "from" => from.to_owned(),
            "model_type" => model_type.as_str(),
        )
        .increment(1);
    }

    fn record_tokens(provider: &str, tokens: u32) {
        metrics::counter!(telemetry::TOKENS_TOTAL, "provider" => provider.to_owned())
            .increment(u64::from(tokens));
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
