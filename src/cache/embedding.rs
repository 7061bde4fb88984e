//! Embedding cache.
//!
//! Embeddings are deterministic for a given model and input, so unlike
//! completions they can live in a plain LRU + TTL cache. Keyed on a
//! content hash of the input text; the stored [`Embedding`] records which
//! model produced it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use moka::future::Cache;

use super::CacheConfig;
use crate::telemetry;
use crate::types::Embedding;

/// In-memory embedding cache backed by moka.
pub struct EmbeddingCache {
    cache: Cache<u64, Embedding>,
}

impl EmbeddingCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries as u64)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up a cached embedding. Emits cache hit/miss metrics.
    pub async fn get(&self, text: &str) -> Option<Embedding> {
        match self.cache.get(&cache_key(text)).await {
            Some(embedding) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => "embed")
                    .increment(1);
                Some(embedding)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => "embed")
                    .increment(1);
                None
            }
        }
    }

    pub async fn insert(&self, text: &str, embedding: Embedding) {
        self.cache.insert(cache_key(text), embedding).await;
    }

    /// Approximate entry count. moka applies writes lazily, so call
    /// [`run_pending_tasks`](Self::run_pending_tasks) first for an exact figure.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

fn cache_key(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    "embed".hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}
