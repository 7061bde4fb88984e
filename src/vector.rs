//! In-memory vector store for embedding similarity search.
//!
//! Items get sequential ids (`item_1`, `item_2`, ...) that are never
//! reused, even after deletes or [`clear`](MemVectorStore::clear). Search
//! is a linear cosine-similarity scan, which is fine for the few thousand
//! vectors a single gateway process accumulates.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Default number of results for [`MemVectorStore::search_similar`].
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

const ID_PREFIX: &str = "item_";

/// A stored text and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorItem {
    pub text: String,
    pub vector: Vec<f32>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub id: String,
    pub text: String,
    pub similarity: f32,
}

#[derive(Default)]
struct Inner {
    items: BTreeMap<u64, VectorItem>,
    next_id: u64,
}

/// Process-local vector store.
#[derive(Default)]
pub struct MemVectorStore {
    inner: Mutex<Inner>,
}

impl MemVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a text with its vector and return the new id.
    pub fn add(&self, text: impl Into<String>, vector: Vec<f32>) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.items.insert(
            id,
            VectorItem {
                text: text.into(),
                vector,
            },
        );
        format_id(id)
    }

    pub fn get(&self, id: &str) -> Option<VectorItem> {
        let key = parse_id(id)?;
        self.lock().items.get(&key).cloned()
    }

    /// Remove an item, returning whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        parse_id(id).is_some_and(|key| self.lock().items.remove(&key).is_some())
    }

    /// The `limit` items most similar to `query`, best first.
    ///
    /// Items whose dimension differs from the query's are skipped. Ties
    /// keep insertion order.
    pub fn search_similar(&self, query: &[f32], limit: usize) -> Vec<SimilarItem> {
        let inner = self.lock();
        let mut hits: Vec<SimilarItem> = inner
            .items
            .iter()
            .filter_map(|(id, item)| {
                cosine_similarity(query, &item.vector).map(|similarity| SimilarItem {
                    id: format_id(*id),
                    text: item.text.clone(),
                    similarity,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);
        hits
    }

    pub fn count(&self) -> usize {
        self.lock().items.len()
    }

    pub fn clear(&self) {
        self.lock().items.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn format_id(id: u64) -> String {
    format!("{ID_PREFIX}{id}")
}

fn parse_id(id: &str) -> Option<u64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

/// Cosine similarity, or `None` when the dimensions differ.
///
/// A zero vector has similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn ids_are_sequential_and_not_reused() {
        let store = MemVectorStore::new();
        assert_eq!(store.add("a", vec![1.0]), "item_1");
        assert_eq!(store.add("b", vec![1.0]), "item_2");
        assert!(store.delete("item_2"));
        assert!(!store.delete("item_2"));
        store.clear();
        assert_eq!(store.add("c", vec![1.0]), "item_3");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn get_and_bad_ids() {
        let store = MemVectorStore::new();
        let id = store.add("hello", vec![0.5, 0.5]);
        assert_eq!(store.get(&id).unwrap().text, "hello");
        assert!(store.get("item_99").is_none());
        assert!(store.get("nope").is_none());
        assert!(!store.delete("item_x"));
    }

    #[test]
    fn search_ranks_and_skips_mismatched() {
        let store = MemVectorStore::new();
        store.add("east", vec![1.0, 0.0]);
        store.add("north", vec![0.0, 1.0]);
        store.add("north-east", vec![1.0, 1.0]);
        store.add("3d", vec![1.0, 0.0, 0.0]);

        let hits = store.search_similar(&[1.0, 0.1], DEFAULT_SEARCH_LIMIT);
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east", "north"]);
        assert_eq!(hits[0].id, "item_1");

        assert_eq!(store.search_similar(&[1.0, 0.1], 1).len(), 1);
        assert!(store.search_similar(&[1.0, 0.1], 0).is_empty());
    }
}
