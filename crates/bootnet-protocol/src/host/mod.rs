//! Node host: the local side effects of the protocol
//!
//! [`NodeHost`] covers everything a node does outside the shared store:
//! invoking the node binary, moving files in its home directory and editing
//! its configuration. [`ProcessNodeHost`] is the production implementation;
//! the testkit provides an in-memory fake.

mod config_edit;
mod process;

pub use config_edit::{set_config_value, MINIMUM_GAS_PRICES_KEY, PERSISTENT_PEERS_KEY};
pub use process::ProcessNodeHost;

use crate::command::NodeCommand;
use crate::state::LocalChainState;
use async_trait::async_trait;
use bootnet_core::{LocalFile, Result};
use std::sync::Arc;

/// Local effects of one node
#[async_trait]
pub trait NodeHost: Send + Sync {
    /// Whether the home directory already holds genesis and validator key
    async fn local_state(&self) -> Result<LocalChainState>;

    /// Run a short-lived node binary command and return its stdout
    async fn run(&self, command: &NodeCommand, args: &[String]) -> Result<String>;

    /// Hand over to the long-running node process
    async fn launch(&self, command: &NodeCommand, args: &[String]) -> Result<()>;

    /// Read a local file
    async fn read_local(&self, file: &LocalFile) -> Result<Vec<u8>>;

    /// Replace a local file
    async fn write_local(&self, file: &LocalFile, content: &[u8]) -> Result<()>;

    /// Create a local directory and its parents
    async fn ensure_dir(&self, dir: &LocalFile) -> Result<()>;

    /// Set `persistent_peers` in the network config
    async fn set_persistent_peers(&self, peers: &str) -> Result<()>;

    /// Set `minimum-gas-prices` in the application config
    async fn set_minimum_gas_prices(&self, price: &str) -> Result<()>;
}

#[async_trait]
impl<T: NodeHost + ?Sized> NodeHost for Arc<T> {
    async fn local_state(&self) -> Result<LocalChainState> {
        (**self).local_state().await
    }

    async fn run(&self, command: &NodeCommand, args: &[String]) -> Result<String> {
        (**self).run(command, args).await
    }

    async fn launch(&self, command: &NodeCommand, args: &[String]) -> Result<()> {
        (**self).launch(command, args).await
    }

    async fn read_local(&self, file: &LocalFile) -> Result<Vec<u8>> {
        (**self).read_local(file).await
    }

    async fn write_local(&self, file: &LocalFile, content: &[u8]) -> Result<()> {
        (**self).write_local(file, content).await
    }

    async fn ensure_dir(&self, dir: &LocalFile) -> Result<()> {
        (**self).ensure_dir(dir).await
    }

    async fn set_persistent_peers(&self, peers: &str) -> Result<()> {
        (**self).set_persistent_peers(peers).await
    }

    async fn set_minimum_gas_prices(&self, price: &str) -> Result<()> {
        (**self).set_minimum_gas_prices(price).await
    }
}
