//! Retry decorator behaviour, on a paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use muninn::providers::{ProviderRegistry, RetryConfig, RetryingAdapter};
use muninn::registry::ModelSet;
use muninn::{Adapter, Completion, ModelRequest, Muninn, MuninnError, Result};

/// Mock adapter that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> MuninnError,
    total_calls: AtomicU32,
    models: ModelSet,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> MuninnError) -> Arc<Self> {
        Arc::new(Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
            models: ModelSet::openai(),
        })
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Adapter for FailThenSucceed {
    fn name(&self) -> &str {
        "mock-retry"
    }

    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<Completion> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok(Completion::new("ok", "test", 1))
    }
}

fn rate_limited() -> MuninnError {
    MuninnError::RateLimited {
        retry_after: Some(Duration::from_secs(3)),
    }
}

fn server_error() -> MuninnError {
    MuninnError::Api {
        status: 502,
        message: "bad gateway".into(),
    }
}

fn auth_error() -> MuninnError {
    MuninnError::AuthenticationFailed
}

fn config(max_attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(100))
}

#[tokio::test(start_paused = true)]
async fn retries_transient_errors_until_success() {
    let inner = FailThenSucceed::new(2, server_error);
    let adapter = RetryingAdapter::new(inner.clone(), config(3));

    let completion = adapter.complete(&ModelRequest::new("hi")).await.unwrap();
    assert_eq!(completion.text, "ok");
    assert_eq!(inner.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let inner = FailThenSucceed::new(10, server_error);
    let adapter = RetryingAdapter::new(inner.clone(), config(3));

    let err = adapter.complete(&ModelRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, MuninnError::Api { status: 502, .. }));
    assert_eq!(inner.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_are_not_retried() {
    let inner = FailThenSucceed::new(1, auth_error);
    let adapter = RetryingAdapter::new(inner.clone(), config(5));

    let err = adapter.complete(&ModelRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, MuninnError::AuthenticationFailed));
    assert_eq!(inner.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn honours_retry_after() {
    let inner = FailThenSucceed::new(1, rate_limited);
    let adapter = RetryingAdapter::new(inner.clone(), config(2));

    let start = tokio::time::Instant::now();
    adapter.complete(&ModelRequest::new("hi")).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(inner.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unsupported_embeddings_pass_through() {
    let inner = FailThenSucceed::new(0, server_error);
    let adapter = RetryingAdapter::new(inner.clone(), config(3));
    let err = adapter.embed("text").await.unwrap_err();
    assert!(matches!(err, MuninnError::Unsupported { .. }));
}

#[test]
fn registry_wraps_only_when_retrying() {
    let mut registry = ProviderRegistry::new();
    registry.set_retry_config(RetryConfig::disabled());
    registry.add(FailThenSucceed::new(0, server_error));
    assert_eq!(registry.names(), vec!["mock-retry"]);
}

#[tokio::test(start_paused = true)]
async fn gateway_retries_inside_provider_before_fallback() {
    let inner = FailThenSucceed::new(1, server_error);
    let gateway = Muninn::builder()
        .adapter(inner.clone())
        .retry(config(2))
        .build()
        .unwrap();

    let response = gateway.route_request(&ModelRequest::new("hi")).await;
    assert_eq!(response.text, "ok");
    assert_eq!(inner.call_count(), 2);
}
