//! Bounded TTL cache for routed completions.
//!
//! Entries are keyed by [`compute_cache_key`](crate::registry::compute_cache_key)
//! and stamped with their insertion time. Expiry is lazy: an expired entry
//! is dropped when it is read, or in bulk by [`ResponseCache::cleanup`].
//! When the cache is full, inserting a new key evicts the entry with the
//! oldest insertion time. Reads do not refresh an entry's age, so this is
//! insertion-ordered eviction, not LRU.
//!
//! Time is read from `tokio::time::Instant`, which lets tests drive expiry
//! with a paused clock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::telemetry;
use crate::types::ModelResponse;

/// Configuration for a TTL cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,000.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 30 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: ModelResponse,
    inserted_at: Instant,
}

/// Process-local response cache.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: config.max_entries,
            ttl: config.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a live entry, purging it if it has expired.
    pub fn get(&self, key: &str) -> Option<ModelResponse> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => "completion")
                    .increment(1);
                return None;
            }
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(key);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => "completion")
                .increment(1);
            return None;
        }
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => "completion").increment(1);
        entries.get(key).map(|entry| entry.response.clone())
    }

    /// Insert or overwrite an entry.
    ///
    /// A new key arriving at a full cache first evicts the oldest entry.
    /// Overwriting an existing key never evicts.
    pub fn set(&self, key: impl Into<String>, response: ModelResponse) {
        if self.max_entries == 0 {
            return;
        }
        let key = key.into();
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            Self::evict_oldest(&mut entries);
        }
        entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purge all expired entries, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "operation" => "completion")
                .increment(1);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
