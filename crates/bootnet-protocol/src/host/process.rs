//! Node host that runs the real node binary

use super::config_edit::{set_config_value, MINIMUM_GAS_PRICES_KEY, PERSISTENT_PEERS_KEY};
use super::NodeHost;
use crate::command::NodeCommand;
use crate::state::LocalChainState;
use async_trait::async_trait;
use bootnet_core::{BinaryConfig, BootstrapError, LocalFile, NodeLayout, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

/// Runs node binary commands through `tokio::process` and touches the node
/// home directly on disk
#[derive(Debug, Clone)]
pub struct ProcessNodeHost {
    program: PathBuf,
    layout: NodeLayout,
}

impl ProcessNodeHost {
    /// Host for the configured binary and node home
    pub fn new(binary: &BinaryConfig, layout: NodeLayout) -> Self {
        let program = if binary.path.is_empty() {
            PathBuf::from(&binary.name)
        } else {
            Path::new(&binary.path).join(&binary.name)
        };
        Self { program, layout }
    }

    /// Program invoked for every command
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }

    fn path(&self, file: &LocalFile) -> PathBuf {
        PathBuf::from(self.layout.path(file))
    }

    /// Lexicographically first `*.json` in the gentx directory
    async fn own_gentx_path(&self) -> Result<PathBuf> {
        let dir = self.path(&LocalFile::GentxDir);
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            BootstrapError::storage(format!("failed to list {}: {e}", dir.display()))
        })?;
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            BootstrapError::storage(format!("failed to list {}: {e}", dir.display()))
        })? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                candidates.push(path);
            }
        }
        candidates.sort();
        candidates.into_iter().next().ok_or_else(|| {
            BootstrapError::storage(format!("no gentx found in {}", dir.display()))
        })
    }

    async fn edit(&self, file: LocalFile, key: &str, value: &str) -> Result<()> {
        let path = self.path(&file);
        let contents = fs::read_to_string(&path).await.map_err(|e| {
            BootstrapError::storage(format!("failed to read {}: {e}", path.display()))
        })?;
        let edited = set_config_value(&contents, key, value)
            .map_err(|e| BootstrapError::storage(format!("{}: {e}", path.display())))?;
        fs::write(&path, edited).await.map_err(|e| {
            BootstrapError::storage(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl NodeHost for ProcessNodeHost {
    async fn local_state(&self) -> Result<LocalChainState> {
        for marker in NodeLayout::initialized_markers() {
            let path = self.path(&marker);
            let present = fs::try_exists(&path).await.map_err(|e| {
                BootstrapError::storage(format!("failed to stat {}: {e}", path.display()))
            })?;
            if !present {
                return Ok(LocalChainState::Fresh);
            }
        }
        Ok(LocalChainState::Initialized)
    }

    async fn run(&self, _command: &NodeCommand, args: &[String]) -> Result<String> {
        tracing::debug!(command = %self.describe(args), "running node command");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                BootstrapError::command_failed(self.describe(args), "spawn failed", e.to_string())
            })?;

        if !output.status.success() {
            return Err(BootstrapError::command_failed(
                self.describe(args),
                output.status.to_string(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn launch(&self, _command: &NodeCommand, args: &[String]) -> Result<()> {
        tracing::info!(command = %self.describe(args), "launching node");
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                BootstrapError::command_failed(self.describe(args), "spawn failed", e.to_string())
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(BootstrapError::command_failed(
                self.describe(args),
                status.to_string(),
                String::new(),
            ))
        }
    }

    async fn read_local(&self, file: &LocalFile) -> Result<Vec<u8>> {
        let path = match file {
            LocalFile::OwnGentx => self.own_gentx_path().await?,
            other => self.path(other),
        };
        fs::read(&path).await.map_err(|e| {
            BootstrapError::storage(format!("failed to read {}: {e}", path.display()))
        })
    }

    async fn write_local(&self, file: &LocalFile, content: &[u8]) -> Result<()> {
        let path = self.path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                BootstrapError::storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        fs::write(&path, content).await.map_err(|e| {
            BootstrapError::storage(format!("failed to write {}: {e}", path.display()))
        })
    }

    async fn ensure_dir(&self, dir: &LocalFile) -> Result<()> {
        let path = self.path(dir);
        fs::create_dir_all(&path).await.map_err(|e| {
            BootstrapError::storage(format!("failed to create {}: {e}", path.display()))
        })
    }

    async fn set_persistent_peers(&self, peers: &str) -> Result<()> {
        self.edit(LocalFile::NetworkConfig, PERSISTENT_PEERS_KEY, peers)
            .await
    }

    async fn set_minimum_gas_prices(&self, price: &str) -> Result<()> {
        self.edit(LocalFile::AppConfig, MINIMUM_GAS_PRICES_KEY, price)
            .await
    }
}
