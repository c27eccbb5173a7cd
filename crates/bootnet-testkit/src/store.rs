//! Shared store with delayed delivery

use crate::time::SimulatedClock;
use async_trait::async_trait;
use bootnet_core::{Result, SignalKey, SignalKind};
use bootnet_protocol::{Clock, MemorySignalStore, Publication, SignalStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How long each published signal stays invisible to readers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryDelays {
    /// Delay for keys without a more specific entry
    pub default_ms: u64,
    /// Delay per signal kind
    pub per_kind: HashMap<SignalKind, u64>,
    /// Delay per key; wins over `per_kind`
    pub per_key: HashMap<SignalKey, u64>,
}

impl DeliveryDelays {
    /// Every signal visible immediately
    pub fn none() -> Self {
        Self::default()
    }

    /// Same delay for every signal
    pub fn uniform(ms: u64) -> Self {
        Self {
            default_ms: ms,
            ..Self::default()
        }
    }

    /// Set the delay for one kind
    pub fn with_kind(mut self, kind: SignalKind, ms: u64) -> Self {
        self.per_kind.insert(kind, ms);
        self
    }

    /// Set the delay for one key
    pub fn with_key(mut self, key: SignalKey, ms: u64) -> Self {
        self.per_key.insert(key, ms);
        self
    }

    /// Delay applied to `key`
    pub fn delay_for(&self, key: &SignalKey) -> u64 {
        self.per_key
            .get(key)
            .or_else(|| self.per_kind.get(&key.kind()))
            .copied()
            .unwrap_or(self.default_ms)
    }
}

/// In-memory signal store where each signal becomes visible only after its
/// delivery delay has elapsed on the simulated clock.
///
/// Write-once checks apply immediately; only visibility is delayed.
#[derive(Debug, Clone)]
pub struct DelayedSignalStore {
    inner: MemorySignalStore,
    clock: SimulatedClock,
    delays: Arc<DeliveryDelays>,
    visible_at: Arc<RwLock<HashMap<SignalKey, u64>>>,
}

impl DelayedSignalStore {
    /// Store over `clock` with the given delays
    pub fn new(clock: SimulatedClock, delays: DeliveryDelays) -> Self {
        Self {
            inner: MemorySignalStore::new(),
            clock,
            delays: Arc::new(delays),
            visible_at: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Every published key, visible or not
    pub async fn published(&self) -> Vec<SignalKey> {
        self.inner.keys().await
    }

    /// Publish bypassing delays, as if written before the run started
    pub async fn preload(&self, key: &SignalKey, content: &[u8]) -> Result<Publication> {
        self.inner.publish(key, content).await
    }

    async fn visible(&self, key: &SignalKey) -> bool {
        match self.visible_at.read().await.get(key) {
            Some(at) => self.clock.now_ms() >= *at,
            None => true,
        }
    }
}

#[async_trait]
impl SignalStore for DelayedSignalStore {
    async fn publish(&self, key: &SignalKey, content: &[u8]) -> Result<Publication> {
        let outcome = self.inner.publish(key, content).await?;
        if outcome == Publication::Created {
            let at = self.clock.now_ms() + self.delays.delay_for(key);
            self.visible_at.write().await.insert(key.clone(), at);
        }
        Ok(outcome)
    }

    async fn fetch(&self, key: &SignalKey) -> Result<Option<Vec<u8>>> {
        if self.visible(key).await {
            self.inner.fetch(key).await
        } else {
            Ok(None)
        }
    }

    async fn contains(&self, key: &SignalKey) -> Result<bool> {
        Ok(self.visible(key).await && self.inner.contains(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_hidden_until_delay_elapses() {
        let clock = SimulatedClock::new();
        let store = DelayedSignalStore::new(
            clock.clone(),
            DeliveryDelays::none().with_kind(SignalKind::Genesis, 1500),
        );
        store.publish(&SignalKey::Genesis, b"{}").await.unwrap();
        store.publish(&SignalKey::SetupComplete, b"true\n").await.unwrap();

        assert!(!store.contains(&SignalKey::Genesis).await.unwrap());
        assert_eq!(store.fetch(&SignalKey::Genesis).await.unwrap(), None);
        assert!(store.contains(&SignalKey::SetupComplete).await.unwrap());

        clock.advance(Duration::from_millis(1500));
        assert!(store.contains(&SignalKey::Genesis).await.unwrap());
        assert_eq!(store.fetch(&SignalKey::Genesis).await.unwrap().unwrap(), b"{}");
    }
}
