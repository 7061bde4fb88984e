//! The adapter trait every LLM provider implements.
//!
//! One trait covers the whole provider surface. The router holds adapters as
//! `Arc<dyn Adapter>` in a table keyed by [`Adapter::name`], so it never
//! needs to know which vendor it is talking to.
//!
//! # Failure semantics
//!
//! Adapters return `Err` for every failure mode (transport, rate limit,
//! malformed body). They do not decide about fallback: the router flattens
//! the error into a degraded [`ModelResponse`](crate::ModelResponse) via
//! [`invoke`](super::invoke) and moves on to the next provider.
//!
//! # Example
//!
//! ```ignore
//! #[async_trait]
//! impl Adapter for EchoAdapter {
//!     fn name(&self) -> &str { "echo" }
//!     fn models(&self) -> &ModelSet { &self.models }
//!     async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
//!         Ok(Completion::new(request.prompt.clone(), "echo-1", 0))
//!     }
//! }
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, stream};

use crate::registry::ModelSet;
use crate::types::{Completion, Embedding, ModelRequest};
use crate::{MuninnError, Result};

/// Stream of text deltas from a provider.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A single LLM provider.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Provider name, used for overrides, status and metrics.
    fn name(&self) -> &str;

    /// Models this adapter uses per request class.
    fn models(&self) -> &ModelSet;

    /// Run a chat completion for a primary or code request.
    ///
    /// The adapter builds the provider payload from
    /// [`build_prompt`](crate::prompt::build_prompt) and reports the model
    /// that actually served the call. Latency is stamped by the router.
    async fn complete(&self, request: &ModelRequest) -> Result<Completion>;

    /// Stream a chat completion as text deltas.
    ///
    /// Default implementation runs [`complete`](Self::complete) and yields
    /// the whole text as one chunk.
    async fn complete_stream(&self, request: &ModelRequest) -> Result<CompletionStream> {
        let completion = self.complete(request).await?;
        Ok(Box::pin(stream::once(async move { Ok(completion.text) })))
    }

    /// Embed a single text.
    ///
    /// Providers without an embeddings endpoint keep the default, which
    /// reports the capability as unsupported.
    async fn embed(&self, _text: &str) -> Result<Embedding> {
        Err(MuninnError::Unsupported {
            provider: self.name().to_string(),
            operation: "embeddings",
        })
    }
}
