//! Local chain state layout inside a node's home directory

use crate::validators::ValidatorName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A file or directory in the node's home that the protocol touches
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalFile {
    /// `config/genesis.json`
    Genesis,
    /// `config/priv_validator_key.json`
    ValidatorKey,
    /// `config/config.toml`
    NetworkConfig,
    /// `config/app.toml`
    AppConfig,
    /// `config/gentx/`
    GentxDir,
    /// The gentx this node produced: the first `*.json` in the gentx directory
    OwnGentx,
    /// A peer's gentx copied into the gentx directory for collection
    ImportedGentx(ValidatorName),
}

impl fmt::Display for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genesis => f.write_str("genesis"),
            Self::ValidatorKey => f.write_str("validator key"),
            Self::NetworkConfig => f.write_str("config.toml"),
            Self::AppConfig => f.write_str("app.toml"),
            Self::GentxDir => f.write_str("gentx directory"),
            Self::OwnGentx => f.write_str("own gentx"),
            Self::ImportedGentx(name) => write!(f, "gentx of {name}"),
        }
    }
}

/// Maps [`LocalFile`]s to paths under a node home directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLayout {
    home: String,
}

impl NodeLayout {
    /// Layout rooted at `home` (the configured data directory)
    pub fn new(home: impl Into<String>) -> Self {
        let home: String = home.into();
        let trimmed = home.trim_end_matches('/');
        Self {
            home: if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }

    /// Home directory
    pub fn home(&self) -> &str {
        &self.home
    }

    /// `<home>/config`
    pub fn config_dir(&self) -> String {
        format!("{}/config", self.home)
    }

    /// Path of a local file.
    ///
    /// `OwnGentx` has no fixed name; its path is the gentx directory and the
    /// concrete file is resolved when it is read.
    pub fn path(&self, file: &LocalFile) -> String {
        let config = self.config_dir();
        match file {
            LocalFile::Genesis => format!("{config}/genesis.json"),
            LocalFile::ValidatorKey => format!("{config}/priv_validator_key.json"),
            LocalFile::NetworkConfig => format!("{config}/config.toml"),
            LocalFile::AppConfig => format!("{config}/app.toml"),
            LocalFile::GentxDir | LocalFile::OwnGentx => format!("{config}/gentx"),
            LocalFile::ImportedGentx(name) => format!("{config}/gentx/{name}_gentx.json"),
        }
    }

    /// Files whose joint presence marks an initialized node
    pub fn initialized_markers() -> [LocalFile; 2] {
        [LocalFile::Genesis, LocalFile::ValidatorKey]
    }
}
