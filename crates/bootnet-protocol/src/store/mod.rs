//! Write-once signal stores
//!
//! A [`SignalStore`] is the rendezvous every node coordinates through. Each
//! key can be written once; publishing the same bytes again is a no-op and
//! publishing different bytes is a [`BootstrapError::SignalConflict`].

mod filesystem;
mod memory;

pub use filesystem::FilesystemSignalStore;
pub use memory::MemorySignalStore;

use async_trait::async_trait;
use bootnet_core::{BootstrapError, Result, SignalKey};
use std::sync::Arc;

/// Outcome of a successful publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    /// The signal did not exist and now does
    Created,
    /// The signal already existed with identical content
    Unchanged,
}

/// Write-once key-value rendezvous
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Publish `content` under `key`
    async fn publish(&self, key: &SignalKey, content: &[u8]) -> Result<Publication>;

    /// Content of `key`, `None` while it is not yet published
    async fn fetch(&self, key: &SignalKey) -> Result<Option<Vec<u8>>>;

    /// Whether `key` is published
    async fn contains(&self, key: &SignalKey) -> Result<bool>;
}

#[async_trait]
impl<T: SignalStore + ?Sized> SignalStore for Arc<T> {
    async fn publish(&self, key: &SignalKey, content: &[u8]) -> Result<Publication> {
        (**self).publish(key, content).await
    }

    async fn fetch(&self, key: &SignalKey) -> Result<Option<Vec<u8>>> {
        (**self).fetch(key).await
    }

    async fn contains(&self, key: &SignalKey) -> Result<bool> {
        (**self).contains(key).await
    }
}

/// Content digest used for write-once comparison
pub fn digest(content: &[u8]) -> blake3::Hash {
    blake3::hash(content)
}

/// Resolve a re-publication against what is already stored
pub(crate) fn republish(
    key: &SignalKey,
    existing: &blake3::Hash,
    content: &[u8],
) -> Result<Publication> {
    if *existing == digest(content) {
        tracing::debug!(signal = %key, "signal already published with identical content");
        Ok(Publication::Unchanged)
    } else {
        tracing::warn!(signal = %key, "conflicting re-publication rejected");
        Err(BootstrapError::signal_conflict(key.clone()))
    }
}
