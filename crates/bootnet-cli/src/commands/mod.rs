//! CLI command implementations

pub mod check;
pub mod generate;
pub mod node;
pub mod script;

use anyhow::{Context, Result};
use bootnet_core::NetworkConfig;
use clap::Args;
use std::path::PathBuf;

/// Configuration file locations shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Global chain configuration
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Ordered validator list; the first entry leads
    #[arg(long, default_value = "validators.json")]
    pub validators: PathBuf,

    /// Deployment settings overriding the defaults
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load and validate the network configuration
    pub fn load(&self) -> Result<NetworkConfig> {
        NetworkConfig::load(&self.config, &self.validators, self.settings.as_deref())
            .context("invalid network configuration")
    }
}
