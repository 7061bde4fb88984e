//! Caching subsystem.
//!
//! Two independent caches:
//!
//! - [`ResponseCache`]: bounded TTL cache for routed completions, keyed by
//!   [`compute_cache_key`](crate::registry::compute_cache_key). Only
//!   successful responses are stored. Eviction is by insertion age.
//!
//! - [`EmbeddingCache`]: moka LRU + TTL cache for embeddings, which are
//!   deterministic per input.

pub mod embedding;
pub mod response;

pub use embedding::EmbeddingCache;
pub use response::{CacheConfig, ResponseCache};
