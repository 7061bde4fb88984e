//! HTTP server for the gateway.
//!
//! This module provides:
//! - Configuration types (`config`)
//! - The axum route table (`routes`) and its handlers (`handlers`)
//! - Assembly of a [`Gateway`] from configuration, and the background
//!   cache sweep the daemon runs next to it

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::gateway::{Gateway, Muninn};
use crate::providers::{Adapter, AnthropicAdapter, GeminiAdapter, OpenAiAdapter};
use crate::registry::{ANTHROPIC, GEMINI, KNOWN_PROVIDERS, ModelSet, OPENAI};
use crate::{MuninnError, Result};
use config::{Config, ProviderConfig, Secrets};

/// Build a [`Gateway`] from configuration, registering each provider in
/// routing order that has a usable key.
pub fn gateway_from_config(config: &Config, secrets: &Secrets) -> Result<Gateway> {
    build_gateway(config, |provider| secrets.api_key(provider))
}

/// Like [`gateway_from_config`] with an explicit key lookup.
///
/// A configured default provider that ended up without a key is ignored
/// with a warning; an unknown provider name in `routing.order` is an error.
pub fn build_gateway(
    config: &Config,
    api_key: impl Fn(&str) -> Option<String>,
) -> Result<Gateway> {
    let mut builder = Muninn::builder()
        .response_cache(config.cache.cache_config())
        .embedding_cache(config.embedding_cache.cache_config())
        .cache_key_scope(config.cache.key_scope)
        .timeout(config.server.call_timeout());
    if let Some(retry) = &config.retry {
        builder = builder.retry(retry.clone());
    }

    for name in config.providers.keys() {
        if !KNOWN_PROVIDERS.contains(&name.as_str()) {
            warn!(provider = %name, "ignoring settings for unknown provider");
        }
    }

    let order: Vec<&str> = match &config.routing.order {
        Some(order) => order.iter().map(String::as_str).collect(),
        None => KNOWN_PROVIDERS.to_vec(),
    };

    let mut registered = Vec::new();
    for name in order {
        if !KNOWN_PROVIDERS.contains(&name) {
            return Err(MuninnError::Configuration(format!(
                "unknown provider '{name}' in routing order"
            )));
        }
        let Some(key) = api_key(name) else {
            info!(provider = name, "no usable API key, provider disabled");
            continue;
        };
        let adapter = build_adapter(name, key, &config.provider(name), builder.http_client())?;
        builder = builder.adapter(adapter);
        registered.push(name);
    }

    if let Some(default) = &config.routing.default_provider {
        if registered.contains(&default.as_str()) {
            builder = builder.default_provider(default);
        } else {
            warn!(provider = %default, "default provider is not available, using routing order");
        }
    }

    info!(providers = ?registered, "gateway configured");
    builder.build()
}

fn build_adapter(
    name: &str,
    key: String,
    settings: &ProviderConfig,
    http: &reqwest::Client,
) -> Result<Arc<dyn Adapter>> {
    let models = ModelSet::for_provider(name)
        .map(|defaults| settings.models(defaults))
        .ok_or_else(|| MuninnError::Configuration(format!("unknown provider '{name}'")))?;
    let base_url = settings.base_url.as_deref();

    let adapter: Arc<dyn Adapter> = match name {
        OPENAI => Arc::new(
            base_url
                .map_or_else(
                    || OpenAiAdapter::new(key.clone()),
                    |url| OpenAiAdapter::with_base_url(key.clone(), url),
                )
                .with_http_client(http.clone())
                .with_models(models),
        ),
        ANTHROPIC => Arc::new(
            base_url
                .map_or_else(
                    || AnthropicAdapter::new(key.clone()),
                    |url| AnthropicAdapter::with_base_url(key.clone(), url),
                )
                .with_http_client(http.clone())
                .with_models(models),
        ),
        GEMINI => Arc::new(
            base_url
                .map_or_else(
                    || GeminiAdapter::new(key.clone()),
                    |url| GeminiAdapter::with_base_url(key.clone(), url),
                )
                .with_http_client(http.clone())
                .with_models(models),
        ),
        _ => {
            return Err(MuninnError::Configuration(format!(
                "unknown provider '{name}'"
            )));
        }
    };
    Ok(adapter)
}

/// Periodically drop expired response-cache entries.
///
/// Returns `None` for a zero interval, which disables the sweep.
pub fn spawn_cache_cleanup(gateway: Arc<Gateway>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = gateway.response_cache().cleanup();
            if removed > 0 {
                debug!(removed, "expired cache entries dropped");
            }
        }
    }))
}

/// Serve the HTTP surface on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(available: &'static [&'static str]) -> impl Fn(&str) -> Option<String> {
        move |provider| {
            available
                .iter()
                .any(|name| *name == provider)
                .then(|| format!("key-{provider}"))
        }
    }

    #[test]
    fn registers_only_providers_with_keys() {
        let gateway = build_gateway(&Config::default(), keys(&[OPENAI, ANTHROPIC])).unwrap();
        assert_eq!(gateway.providers().names(), vec![OPENAI, ANTHROPIC]);
        let status = gateway.status();
        assert!(!status.providers[GEMINI]);
        assert!(status.providers[OPENAI]);
        assert!(status.embeddings);
    }

    #[test]
    fn routing_order_and_default() {
        let config: Config = toml::from_str(
            r#"
            [routing]
            default_provider = "anthropic"
            order = ["anthropic", "gemini"]
            "#,
        )
        .unwrap();
        let gateway = build_gateway(&config, keys(&[OPENAI, ANTHROPIC, GEMINI])).unwrap();
        assert_eq!(gateway.providers().names(), vec![ANTHROPIC, GEMINI]);
        assert_eq!(gateway.default_provider().as_deref(), Some(ANTHROPIC));
    }

    #[test]
    fn unavailable_default_is_ignored() {
        let config: Config =
            toml::from_str("[routing]\ndefault_provider = \"openai\"").unwrap();
        let gateway = build_gateway(&config, keys(&[GEMINI])).unwrap();
        assert_eq!(gateway.default_provider().as_deref(), Some(GEMINI));
    }

    #[test]
    fn unknown_provider_in_order_is_an_error() {
        let config: Config = toml::from_str("[routing]\norder = [\"mistral\"]").unwrap();
        let err = build_gateway(&config, |_| None).err().unwrap();
        assert!(matches!(err, MuninnError::Configuration(_)));
    }

    #[test]
    fn no_keys_gives_empty_gateway() {
        let gateway = build_gateway(&Config::default(), |_| None).unwrap();
        assert!(gateway.providers().is_empty());
        assert!(!gateway.status().primary);
    }
}
