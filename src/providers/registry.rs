//! Provider table in fallback order.
//!
//! `ProviderRegistry` stores adapters in registration order (index 0 is
//! tried first when no default is set) and looks them up by name. It is
//! built once and then only read: per-request fallback walks a
//! [`rotation`](ProviderRegistry::rotation) starting at the selected
//! provider, so concurrent requests never disturb each other.
//!
//! # Fallback Chain Flow
//!
//! ```text
//! registry: [gemini, openai, anthropic]      request starts at: openai
//!
//!   openai ──► error ──► anthropic ──► error ──► gemini ──► error ──► exhausted
//!     │                     │                      │
//!     └── ok: return        └── ok: return         └── ok: return
//! ```
//!
//! # Retry Wrapping
//!
//! When a [`RetryConfig`] is set, adapters are wrapped in
//! [`RetryingAdapter`] at registration time, so each provider retries
//! internally before the router sees its error.

use std::sync::Arc;

use super::retry::{RetryConfig, RetryingAdapter};
use super::traits::Adapter;

/// Adapters keyed by name, in fallback order.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
    retry_config: Option<RetryConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry configuration for adapters registered afterwards.
    pub fn set_retry_config(&mut self, config: RetryConfig) {
        self.retry_config = Some(config);
    }

    /// Register an adapter at the end of the chain.
    ///
    /// Registering a name twice replaces the earlier adapter in place.
    pub fn add(&mut self, adapter: Arc<dyn Adapter>) {
        let adapter = match &self.retry_config {
            Some(config) if config.max_attempts > 1 => {
                Arc::new(RetryingAdapter::new(adapter, config.clone())) as Arc<dyn Adapter>
            }
            _ => adapter,
        };
        match self.position(adapter.name()) {
            Some(idx) => self.adapters[idx] = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.adapters.iter().position(|a| a.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Registered names in fallback order.
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.iter()
    }

    /// Every adapter exactly once, starting at `start` and wrapping around.
    pub fn rotation(&self, start: usize) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        let len = self.adapters.len();
        let start = if len == 0 { 0 } else { start % len };
        self.adapters[start..]
            .iter()
            .chain(self.adapters[..start].iter())
    }
}
