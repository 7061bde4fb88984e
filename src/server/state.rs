//! Shared handler state.

use std::sync::Arc;

use crate::gateway::Gateway;
use crate::store::{InteractionStore, MemoryInteractionStore};
use crate::vector::MemVectorStore;

/// State handed to every HTTP handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub vectors: Arc<MemVectorStore>,
    pub interactions: Arc<dyn InteractionStore>,
}

impl AppState {
    /// State with an empty vector store and an in-memory interaction log.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            vectors: Arc::new(MemVectorStore::new()),
            interactions: Arc::new(MemoryInteractionStore::default()),
        }
    }

    pub fn with_interactions(mut self, store: Arc<dyn InteractionStore>) -> Self {
        self.interactions = store;
        self
    }
}
