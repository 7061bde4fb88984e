//! Muninn - LLM gateway with caching and provider fallback
//!
//! This crate routes completion requests across several LLM providers
//! (OpenAI, Anthropic, Gemini), caches successful responses for a TTL,
//! and falls back to the next provider when a call fails. A request
//! always gets an answer: when every provider fails the caller receives a
//! degraded response with `modelUsed == "error"` instead of an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use muninn::{ModelRequest, ModelType, Muninn};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let gateway = Muninn::builder()
//!         .gemini("gemini-key")
//!         .openai("sk-your-key")
//!         .build()?;
//!
//!     let request = ModelRequest::new("Explain ownership in Rust")
//!         .model_type(ModelType::Primary)
//!         .max_tokens(500);
//!     let response = gateway.route_request(&request).await;
//!
//!     if response.is_error() {
//!         eprintln!("degraded: {}", response.text);
//!     } else {
//!         println!("{} ({} ms)", response.text, response.latency_ms);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # HTTP server (requires `server` feature)
//!
//! [`server::router`] exposes the gateway under `/api/llm`,
//! `/api/llm/stream`, `/api/llm/status`, `/api/embeddings`,
//! `/api/similarity` and `/api/health`. The `muninnd` binary wires it to
//! a TOML configuration.

pub mod cache;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod providers;
pub mod registry;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod vector;
mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, EmbeddingCache, ResponseCache};
pub use error::{MuninnError, Result};
pub use gateway::{Gateway, Muninn, MuninnBuilder};
pub use providers::{Adapter, CompletionStream, RetryConfig};
pub use registry::{CacheKeyScope, ModelSet, compute_cache_key};
pub use store::{Interaction, InteractionStore, MemoryInteractionStore};
pub use vector::{MemVectorStore, SimilarItem};
pub use version::{PKG_VERSION, version_string};

pub use types::{
    Completion, Embedding, Message, ModelRequest, ModelResponse, ModelType, ProviderStatus,
    RequestContext, Role, TaskType,
};
