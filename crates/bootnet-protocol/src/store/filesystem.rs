//! Signal store over a shared directory
//!
//! Each signal is one file named by [`SignalKey::file_name`], so the layout
//! matches what the rendered startup scripts read and write. Content is
//! written to a hidden temporary sibling and hard-linked into place: readers
//! never see a partial file and a lost race surfaces as `AlreadyExists`.

use super::{digest, republish, Publication, SignalStore};
use async_trait::async_trait;
use bootnet_core::{BootstrapError, Result, SignalKey};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed signal store
#[derive(Debug, Clone)]
pub struct FilesystemSignalStore {
    base_path: PathBuf,
}

impl FilesystemSignalStore {
    /// Store rooted at `base_path` (the shared directory mount point)
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Shared directory
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the file backing `key`
    pub fn path_of(&self, key: &SignalKey) -> PathBuf {
        self.base_path.join(key.file_name())
    }

    fn temp_path(&self, key: &SignalKey) -> PathBuf {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.base_path
            .join(format!(".{}.{}.{seq}.tmp", key.file_name(), std::process::id()))
    }
}

#[async_trait]
impl SignalStore for FilesystemSignalStore {
    async fn publish(&self, key: &SignalKey, content: &[u8]) -> Result<Publication> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            BootstrapError::storage(format!(
                "failed to create shared directory {}: {e}",
                self.base_path.display()
            ))
        })?;

        let target = self.path_of(key);
        let temp = self.temp_path(key);
        fs::write(&temp, content).await.map_err(|e| {
            BootstrapError::storage(format!("failed to write {}: {e}", temp.display()))
        })?;

        let linked = fs::hard_link(&temp, &target).await;
        if let Err(e) = fs::remove_file(&temp).await {
            tracing::debug!(path = %temp.display(), error = %e, "failed to remove temporary signal file");
        }

        match linked {
            Ok(()) => {
                tracing::debug!(signal = %key, path = %target.display(), "signal published");
                Ok(Publication::Created)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read(&target).await.map_err(|e| {
                    BootstrapError::storage(format!("failed to read {}: {e}", target.display()))
                })?;
                republish(key, &digest(&existing), content)
            }
            Err(e) => Err(BootstrapError::storage(format!(
                "failed to publish {}: {e}",
                target.display()
            ))),
        }
    }

    async fn fetch(&self, key: &SignalKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(key);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BootstrapError::storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn contains(&self, key: &SignalKey) -> Result<bool> {
        let path = self.path_of(key);
        fs::try_exists(&path).await.map_err(|e| {
            BootstrapError::storage(format!("failed to stat {}: {e}", path.display()))
        })
    }
}
