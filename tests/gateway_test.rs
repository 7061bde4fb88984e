//! Router behaviour: caching, fallback, overrides, timeouts, streaming,
//! embeddings and status, exercised against in-process mock adapters.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use muninn::registry::{CacheKeyScope, ModelSet};
use muninn::types::{EXHAUSTED_MESSAGE, RequestContext};
use muninn::{
    Adapter, Completion, CompletionStream, Embedding, Gateway, ModelRequest, ModelType, Muninn,
    MuninnError, Result,
};

// ============================================================================
// Mock adapter
// ============================================================================

#[derive(Clone, Copy)]
enum Behavior {
    Reply,
    Fail,
    Hang,
    /// Replies, but a stream stops after its first delta without ending.
    Stall,
}

struct MockAdapter {
    name: &'static str,
    models: ModelSet,
    behavior: Behavior,
    embeds: bool,
    calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl MockAdapter {
    fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            models: ModelSet {
                primary: format!("{name}-primary"),
                code: format!("{name}-code"),
                embeddings: None,
            },
            behavior,
            embeds: false,
            calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
        })
    }

    fn embedding(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            models: ModelSet {
                primary: format!("{name}-primary"),
                code: format!("{name}-code"),
                embeddings: Some(format!("{name}-embed")),
            },
            behavior: Behavior::Reply,
            embeds: true,
            calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Reply | Behavior::Stall => Ok(Completion::new(
                format!("{} says: {}", self.name, request.prompt),
                self.models.chat_model(request.model_type),
                7,
            )),
            Behavior::Fail => Err(MuninnError::Api {
                status: 500,
                message: "boom".into(),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Completion::new("too late", "hang", 0))
            }
        }
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<CompletionStream> {
        let completion = self.complete(request).await?;
        let mut words: Vec<Result<String>> = completion
            .text
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        if let Behavior::Stall = self.behavior {
            words.truncate(1);
            let stalled = futures_util::stream::iter(words)
                .chain(futures_util::stream::pending::<Result<String>>());
            return Ok(Box::pin(stalled));
        }
        Ok(Box::pin(futures_util::stream::iter(words)))
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        if !self.embeds {
            return Err(MuninnError::Unsupported {
                provider: self.name.to_string(),
                operation: "embeddings",
            });
        }
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        let values = vec![text.len() as f32, 1.0, 0.0];
        Ok(Embedding {
            dimensions: values.len(),
            values,
            model: format!("{}-embed", self.name),
        })
    }
}

fn gateway(adapters: &[Arc<MockAdapter>]) -> Gateway {
    adapters
        .iter()
        .fold(Muninn::builder(), |builder, adapter| {
            builder.adapter(adapter.clone())
        })
        .build()
        .unwrap()
}

fn with_provider(prompt: &str, provider: &str) -> ModelRequest {
    ModelRequest::new(prompt).context(RequestContext::new().with("provider", provider))
}

// ============================================================================
// Completions
// ============================================================================

#[tokio::test]
async fn round_trip_uses_default_provider_once() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = gateway(&[a.clone(), b.clone()]);

    let response = gateway.route_request(&ModelRequest::new("hi")).await;

    assert!(!response.is_error());
    assert_eq!(response.text, "a says: hi");
    assert_eq!(response.model_used, "a-primary");
    assert_eq!(response.tokens_used, 7);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn code_requests_use_code_model() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let gateway = gateway(&[a]);
    let request = ModelRequest::new("fn main").model_type(ModelType::Code);
    assert_eq!(gateway.route_request(&request).await.model_used, "a-code");
}

#[tokio::test]
async fn identical_request_is_served_from_cache() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let gateway = gateway(&[a.clone()]);
    let request = ModelRequest::new("cache me");

    let first = gateway.route_request(&request).await;
    let second = gateway.route_request(&request).await;

    assert_eq!(first, second);
    assert_eq!(a.calls(), 1);

    // Any keyed field change is a different entry.
    gateway
        .route_request(&ModelRequest::new("cache me").max_tokens(10))
        .await;
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn request_scope_shares_entry_across_overrides() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = gateway(&[a.clone(), b.clone()]);

    gateway.route_request(&with_provider("same", "a")).await;
    let second = gateway.route_request(&with_provider("same", "b")).await;

    assert_eq!(second.model_used, "a-primary");
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn provider_scope_keys_on_override() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = Muninn::builder()
        .adapter(a.clone())
        .adapter(b.clone())
        .cache_key_scope(CacheKeyScope::Provider)
        .build()
        .unwrap();

    gateway.route_request(&with_provider("same", "a")).await;
    let second = gateway.route_request(&with_provider("same", "b")).await;

    assert_eq!(second.model_used, "b-primary");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn failure_falls_back_to_next_provider() {
    let a = MockAdapter::new("a", Behavior::Fail);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = gateway(&[a.clone(), b.clone()]);

    let response = gateway.route_request(&ModelRequest::new("hi")).await;

    assert_eq!(response.model_used, "b-primary");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    // Fallback is request-local: the default is untouched.
    assert_eq!(gateway.default_provider().as_deref(), Some("a"));
}

#[tokio::test]
async fn all_failing_returns_apology_after_one_call_each() {
    let adapters = [
        MockAdapter::new("a", Behavior::Fail),
        MockAdapter::new("b", Behavior::Fail),
        MockAdapter::new("c", Behavior::Fail),
    ];
    let gateway = gateway(&adapters);

    let response = gateway.route_request(&ModelRequest::new("hi")).await;

    assert!(response.is_error());
    assert_eq!(response.model_used, "error");
    assert_eq!(response.text, EXHAUSTED_MESSAGE);
    assert_eq!(response.tokens_used, 0);
    for adapter in &adapters {
        assert_eq!(adapter.calls(), 1, "{} called more than once", adapter.name);
    }

    // Failures are never cached.
    gateway.route_request(&ModelRequest::new("hi")).await;
    assert_eq!(adapters[0].calls(), 2);
    assert!(gateway.response_cache().is_empty());
}

#[tokio::test]
async fn no_providers_returns_apology() {
    let gateway = Muninn::builder().build().unwrap();
    let response = gateway.route_request(&ModelRequest::new("hi")).await;
    assert!(response.is_error());
    assert_eq!(response.text, EXHAUSTED_MESSAGE);
}

#[tokio::test]
async fn override_starts_rotation_and_wraps() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let b = MockAdapter::new("b", Behavior::Fail);
    let c = MockAdapter::new("c", Behavior::Fail);
    let gateway = gateway(&[a.clone(), b.clone(), c.clone()]);

    let response = gateway.route_request(&with_provider("hi", "b")).await;

    // b → c → a
    assert_eq!(response.model_used, "a-primary");
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
}

#[tokio::test]
async fn unknown_override_uses_default() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = Muninn::builder()
        .adapter(a.clone())
        .adapter(b.clone())
        .default_provider("b")
        .build()
        .unwrap();

    let response = gateway.route_request(&with_provider("hi", "mistral")).await;
    assert_eq!(response.model_used, "b-primary");
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn set_default_provider_requires_registration() {
    let gateway = gateway(&[
        MockAdapter::new("a", Behavior::Reply),
        MockAdapter::new("b", Behavior::Reply),
    ]);
    gateway.set_default_provider("b").unwrap();
    assert_eq!(gateway.default_provider().as_deref(), Some("b"));

    let err = gateway.set_default_provider("z").unwrap_err();
    assert!(matches!(err, MuninnError::UnknownProvider(name) if name == "z"));
    assert_eq!(gateway.default_provider().as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn hung_provider_times_out_and_falls_back() {
    let a = MockAdapter::new("a", Behavior::Hang);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = Muninn::builder()
        .adapter(a.clone())
        .adapter(b.clone())
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let response = gateway.route_request(&ModelRequest::new("hi")).await;
    assert_eq!(response.model_used, "b-primary");
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn concurrent_requests_are_independent() {
    let a = MockAdapter::new("a", Behavior::Fail);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = Arc::new(gateway(&[a.clone(), b.clone()]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .route_request(&ModelRequest::new(format!("q{i}")))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().model_used, "b-primary");
    }
    assert_eq!(a.calls(), 8);
    assert_eq!(b.calls(), 8);
}

#[tokio::test]
async fn reordered_context_hits_the_same_entry() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let gateway = Muninn::builder()
        .adapter(a.clone())
        .cache_key_scope(CacheKeyScope::Provider)
        .build()
        .unwrap();
    let forward = ModelRequest::new("hi").context(
        RequestContext::new()
            .with("provider", "a")
            .with("taskType", "general")
            .with("code", "let x = 1;"),
    );
    let backward = ModelRequest::new("hi").context(
        RequestContext::new()
            .with("code", "let x = 1;")
            .with("taskType", "general")
            .with("provider", "a"),
    );

    let first = gateway.route_request(&forward).await;
    let second = gateway.route_request(&backward).await;

    assert_eq!(first, second);
    assert_eq!(a.calls(), 1);
}

// ============================================================================
// Streaming
// ============================================================================

async fn collect(stream: CompletionStream) -> String {
    stream
        .map(|item| item.unwrap())
        .collect::<Vec<_>>()
        .await
        .concat()
}

#[tokio::test]
async fn stream_yields_deltas() {
    let gateway = gateway(&[MockAdapter::new("a", Behavior::Reply)]);
    let stream = gateway.stream_request(&ModelRequest::new("one two")).await;
    assert_eq!(collect(stream).await, "a says: one two");
}

#[tokio::test]
async fn stream_falls_back_on_open_failure() {
    let a = MockAdapter::new("a", Behavior::Fail);
    let b = MockAdapter::new("b", Behavior::Reply);
    let gateway = gateway(&[a.clone(), b]);

    let stream = gateway.stream_request(&ModelRequest::new("hi")).await;
    assert_eq!(collect(stream).await, "b says: hi");
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn exhausted_stream_yields_apology() {
    let gateway = gateway(&[MockAdapter::new("a", Behavior::Fail)]);
    let stream = gateway.stream_request(&ModelRequest::new("hi")).await;
    assert_eq!(collect(stream).await, EXHAUSTED_MESSAGE);
}

#[tokio::test(start_paused = true)]
async fn stalled_stream_ends_with_timeout() {
    let gateway = Muninn::builder()
        .adapter(MockAdapter::new("a", Behavior::Stall))
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let mut stream = gateway.stream_request(&ModelRequest::new("first second")).await;

    assert_eq!(stream.next().await.unwrap().unwrap(), "a ");
    let stalled = tokio::time::timeout(Duration::from_secs(3600), stream.next())
        .await
        .expect("idle deadline should end the stream");
    assert!(matches!(stalled, Some(Err(MuninnError::Timeout(_)))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn streams_are_not_cached() {
    let a = MockAdapter::new("a", Behavior::Reply);
    let gateway = gateway(&[a.clone()]);
    let request = ModelRequest::new("hi");
    collect(gateway.stream_request(&request).await).await;
    collect(gateway.stream_request(&request).await).await;
    assert_eq!(a.calls(), 2);
    assert!(gateway.response_cache().is_empty());
}

// ============================================================================
// Embeddings
// ============================================================================

#[tokio::test]
async fn embed_skips_providers_without_embeddings() {
    let chat = MockAdapter::new("chat", Behavior::Reply);
    let embedder = MockAdapter::embedding("embedder");
    let gateway = gateway(&[chat, embedder.clone()]);

    let embedding = gateway.embed("hello").await.unwrap();
    assert_eq!(embedding.model, "embedder-embed");
    assert_eq!(embedding.dimensions, 3);

    // Memoised per text.
    gateway.embed("hello").await.unwrap();
    assert_eq!(embedder.embed_calls(), 1);
}

#[tokio::test]
async fn embed_without_capable_provider_fails() {
    let gateway = gateway(&[MockAdapter::new("chat", Behavior::Reply)]);
    let err = gateway.embed("hello").await.unwrap_err();
    assert!(matches!(err, MuninnError::Unsupported { .. }));

    let empty = Muninn::builder().build().unwrap();
    assert!(matches!(
        empty.embed("hello").await.unwrap_err(),
        MuninnError::NoProvider
    ));
}

#[tokio::test]
async fn embeddings_model_type_reports_dimensions() {
    let gateway = gateway(&[
        MockAdapter::new("chat", Behavior::Reply),
        MockAdapter::embedding("embedder"),
    ]);
    let request = ModelRequest::new("three word text").model_type(ModelType::Embeddings);

    let response = gateway.route_request(&request).await;

    assert_eq!(response.model_used, "embedder-embed");
    assert_eq!(response.tokens_used, 3);
    let body: serde_json::Value = serde_json::from_str(&response.text).unwrap();
    assert_eq!(body["dimensions"], 3);
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn status_reflects_registered_providers() {
    let gateway = gateway(&[
        MockAdapter::new("openai", Behavior::Reply),
        MockAdapter::new("gemini", Behavior::Reply),
    ]);
    let status = gateway.status();

    assert!(status.primary);
    assert!(status.code);
    assert!(!status.embeddings);
    assert_eq!(status.providers.get("openai"), Some(&true));
    assert_eq!(status.providers.get("gemini"), Some(&true));
    assert_eq!(status.providers.get("anthropic"), Some(&false));
}

#[tokio::test]
async fn status_of_empty_gateway() {
    let status = Muninn::builder().build().unwrap().status();
    assert!(!status.primary && !status.code && !status.embeddings);
    assert!(status.providers.values().all(|available| !available));
}
