//! Shared signal vocabulary
//!
//! A signal is a write-once marker in the shared coordination namespace.
//! Presence means "the producer completed the corresponding step"; absence
//! means "not yet produced". Per-validator signals are namespaced by the
//! validator name so every key derives only from names in the set.

use crate::validators::ValidatorName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a shared signal, independent of its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Account address of a validator's key
    Address,
    /// Tendermint node id of a validator
    NodeId,
    /// Genesis transaction produced by a validator
    Gentx,
    /// Leader's genesis with every funded account
    Genesis,
    /// Marker that `Genesis` is ready to be copied
    GenesisAccountsReady,
    /// Genesis after gentx collection
    FinalGenesis,
    /// Marker that the leader finished network-wide setup
    SetupComplete,
}

impl SignalKind {
    /// Stable label used in logs and file names
    pub fn label(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::NodeId => "nodeid",
            Self::Gentx => "gentx",
            Self::Genesis => "genesis",
            Self::GenesisAccountsReady => "genesis_accounts_ready",
            Self::FinalGenesis => "final_genesis",
            Self::SetupComplete => "setup_complete",
        }
    }

    /// Whether the kind is namespaced by a validator name
    pub fn is_per_validator(self) -> bool {
        matches!(self, Self::Address | Self::NodeId | Self::Gentx)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fully qualified signal key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "owner", rename_all = "snake_case")]
pub enum SignalKey {
    /// `address[v]`
    Address(ValidatorName),
    /// `nodeid[v]`
    NodeId(ValidatorName),
    /// `gentx[v]`
    Gentx(ValidatorName),
    /// `genesis`
    Genesis,
    /// `genesis_accounts_ready`
    GenesisAccountsReady,
    /// `final_genesis`
    FinalGenesis,
    /// `setup_complete`
    SetupComplete,
}

impl SignalKey {
    /// Kind of this key
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Address(_) => SignalKind::Address,
            Self::NodeId(_) => SignalKind::NodeId,
            Self::Gentx(_) => SignalKind::Gentx,
            Self::Genesis => SignalKind::Genesis,
            Self::GenesisAccountsReady => SignalKind::GenesisAccountsReady,
            Self::FinalGenesis => SignalKind::FinalGenesis,
            Self::SetupComplete => SignalKind::SetupComplete,
        }
    }

    /// Validator that owns the signal, if it is per-validator
    pub fn owner(&self) -> Option<&ValidatorName> {
        match self {
            Self::Address(name) | Self::NodeId(name) | Self::Gentx(name) => Some(name),
            _ => None,
        }
    }

    /// File name inside the shared directory
    pub fn file_name(&self) -> String {
        match self {
            Self::Address(name) => format!("{name}_address"),
            Self::NodeId(name) => format!("{name}_nodeid"),
            Self::Gentx(name) => format!("{name}_gentx.json"),
            Self::Genesis => "genesis.json".to_string(),
            Self::GenesisAccountsReady => "genesis_accounts_ready".to_string(),
            Self::FinalGenesis => "final_genesis.json".to_string(),
            Self::SetupComplete => "setup_complete".to_string(),
        }
    }

    /// Content written for pure markers
    pub fn marker_content() -> &'static [u8] {
        b"true\n"
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner() {
            Some(owner) => write!(f, "{}[{}]", self.kind(), owner),
            None => f.write_str(self.kind().label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_follow_shared_layout() {
        let name = ValidatorName::new_unchecked("validator2");
        assert_eq!(
            SignalKey::Address(name.clone()).file_name(),
            "validator2_address"
        );
        assert_eq!(
            SignalKey::NodeId(name.clone()).file_name(),
            "validator2_nodeid"
        );
        assert_eq!(SignalKey::Gentx(name).file_name(), "validator2_gentx.json");
        assert_eq!(SignalKey::Genesis.file_name(), "genesis.json");
        assert_eq!(SignalKey::FinalGenesis.file_name(), "final_genesis.json");
        assert_eq!(
            SignalKey::GenesisAccountsReady.file_name(),
            "genesis_accounts_ready"
        );
    }

    #[test]
    fn test_owner_and_kind() {
        let name = ValidatorName::new_unchecked("a");
        let key = SignalKey::Gentx(name.clone());
        assert_eq!(key.owner(), Some(&name));
        assert!(key.kind().is_per_validator());
        assert_eq!(SignalKey::SetupComplete.owner(), None);
        assert!(!SignalKind::SetupComplete.is_per_validator());
        assert_eq!(key.to_string(), "gentx[a]");
    }
}
