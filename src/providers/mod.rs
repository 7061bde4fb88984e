//! Provider adapters and the call boundary the router uses.
//!
//! Each vendor module implements [`Adapter`]. The free functions here are
//! the single place where an adapter call gets a deadline and, for
//! [`invoke`], where a failure is flattened into the degraded
//! [`ModelResponse`] shape.

pub mod anthropic;
pub mod backpressure;
pub mod gemini;
mod http;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod sse;
pub mod traits;

pub use anthropic::AnthropicAdapter;
pub use backpressure::{DEFAULT_STREAM_BUFFER, bounded_stream};
pub use gemini::GeminiAdapter;
pub use http::client as http_client;
pub use openai::OpenAiAdapter;
pub use registry::ProviderRegistry;
pub use retry::{RetryConfig, RetryingAdapter};
pub use traits::{Adapter, CompletionStream};

use std::time::Duration;

use futures_util::{StreamExt, future, stream};
use tracing::warn;

use crate::types::{Completion, ModelRequest, ModelResponse, ModelType};
use crate::{MuninnError, Result};

/// Status line placed in the text of an embeddings-class completion.
const EMBEDDINGS_MESSAGE: &str = "Embeddings generated successfully";

/// Run one adapter call, bounded by `timeout`.
///
/// `embeddings` requests go through [`Adapter::embed`] and report the
/// vector size instead of generated text.
pub async fn call(
    adapter: &dyn Adapter,
    request: &ModelRequest,
    timeout: Duration,
) -> Result<Completion> {
    let call = async {
        match request.model_type {
            ModelType::Embeddings => embeddings_completion(adapter, &request.prompt).await,
            ModelType::Primary | ModelType::Code => adapter.complete(request).await,
        }
    };
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| MuninnError::Timeout(timeout))?
}

/// Like [`call`], but never fails: errors become a degraded response whose
/// text explains the failure category. Latency is left at zero for the
/// router to fill in.
pub async fn invoke(
    adapter: &dyn Adapter,
    request: &ModelRequest,
    timeout: Duration,
) -> ModelResponse {
    match call(adapter, request, timeout).await {
        Ok(completion) => completion.into_response(0),
        Err(e) => {
            warn!(provider = adapter.name(), error = %e, "provider call failed");
            ModelResponse::from_error(&e)
        }
    }
}

/// Open a completion stream.
///
/// `timeout` bounds the time to connect, and then the gap between
/// consecutive deltas (see [`with_idle_timeout`]).
pub async fn open_stream(
    adapter: &dyn Adapter,
    request: &ModelRequest,
    timeout: Duration,
) -> Result<CompletionStream> {
    let open = async {
        match request.model_type {
            ModelType::Embeddings => {
                let completion = embeddings_completion(adapter, &request.prompt).await?;
                let once: CompletionStream =
                    Box::pin(stream::once(async move { Ok(completion.text) }));
                Ok(once)
            }
            ModelType::Primary | ModelType::Code => adapter.complete_stream(request).await,
        }
    };
    let stream = tokio::time::timeout(timeout, open)
        .await
        .map_err(|_| MuninnError::Timeout(timeout))??;
    Ok(with_idle_timeout(stream, timeout))
}

/// End `inner` with a [`MuninnError::Timeout`] item once no delta has
/// arrived for `timeout`.
pub fn with_idle_timeout(inner: CompletionStream, timeout: Duration) -> CompletionStream {
    let deadline = tokio_stream::StreamExt::timeout(inner, timeout);
    Box::pin(deadline.scan(false, move |stalled, item| {
        if *stalled {
            return future::ready(None);
        }
        let item = item.unwrap_or_else(|_| {
            *stalled = true;
            Err(MuninnError::Timeout(timeout))
        });
        future::ready(Some(item))
    }))
}

async fn embeddings_completion(adapter: &dyn Adapter, text: &str) -> Result<Completion> {
    let embedding = adapter.embed(text).await?;
    let summary = serde_json::json!({
        "message": EMBEDDINGS_MESSAGE,
        "dimensions": embedding.dimensions,
    });
    let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
    Ok(Completion::new(summary.to_string(), embedding.model, words))
}
