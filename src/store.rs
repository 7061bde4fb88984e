//! Interaction log.
//!
//! Request/response pairs are recorded best-effort: the HTTP layer spawns
//! the write and never waits for it, so a slow or failing store cannot
//! delay a reply.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{ModelRequest, ModelResponse};

/// Entries kept by [`MemoryInteractionStore::default`].
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// One served request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub request: ModelRequest,
    pub response: ModelResponse,
    /// Milliseconds since the unix epoch.
    pub timestamp_ms: u64,
}

impl Interaction {
    pub fn new(request: ModelRequest, response: ModelResponse) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            request,
            response,
            timestamp_ms,
        }
    }
}

/// Persistence backend for the interaction log.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn record(&self, interaction: Interaction) -> Result<()>;

    /// Up to `limit` most recent interactions, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Interaction>>;
}

/// Bounded in-memory log; the oldest entry is dropped when full.
pub struct MemoryInteractionStore {
    entries: Mutex<VecDeque<Interaction>>,
    capacity: usize,
}

impl MemoryInteractionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Interaction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryInteractionStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[async_trait]
impl InteractionStore for MemoryInteractionStore {
    async fn record(&self, interaction: Interaction) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(interaction);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Interaction>> {
        Ok(self.lock().iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Completion;

    fn interaction(prompt: &str) -> Interaction {
        Interaction::new(
            ModelRequest::new(prompt),
            Completion::new("ok", "gpt-4o", 1).into_response(3),
        )
    }

    #[tokio::test]
    async fn keeps_newest_within_capacity() {
        let store = MemoryInteractionStore::new(2);
        for prompt in ["one", "two", "three"] {
            store.record(interaction(prompt)).await.unwrap();
        }
        assert_eq!(store.len(), 2);
        let recent = store.recent(10).await.unwrap();
        let prompts: Vec<&str> = recent.iter().map(|i| i.request.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["three", "two"]);
    }

    #[tokio::test]
    async fn zero_capacity_records_nothing() {
        let store = MemoryInteractionStore::new(0);
        store.record(interaction("hi")).await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn timestamp_is_set() {
        assert!(interaction("hi").timestamp_ms > 0);
    }
}
