//! In-memory signal store

use super::{digest, republish, Publication, SignalStore};
use async_trait::async_trait;
use bootnet_core::{Result, SignalKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct SignalEntry {
    content: Vec<u8>,
    digest: blake3::Hash,
}

/// Signal store held in process memory; clones share the same entries
#[derive(Debug, Clone, Default)]
pub struct MemorySignalStore {
    entries: Arc<RwLock<HashMap<SignalKey, SignalEntry>>>,
}

impl MemorySignalStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of published signals
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is published
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Published keys, sorted
    pub async fn keys(&self) -> Vec<SignalKey> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn publish(&self, key: &SignalKey, content: &[u8]) -> Result<Publication> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            return republish(key, &existing.digest, content);
        }
        entries.insert(
            key.clone(),
            SignalEntry {
                content: content.to_vec(),
                digest: digest(content),
            },
        );
        Ok(Publication::Created)
    }

    async fn fetch(&self, key: &SignalKey) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.content.clone()))
    }

    async fn contains(&self, key: &SignalKey) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }
}
