//! Per-node bootstrap states and the role-dependent transition relation

use bootnet_core::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a node finds in its home directory when it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalChainState {
    /// Genesis or validator key missing: run the full handshake
    Fresh,
    /// Genesis and validator key present: warm restart
    Initialized,
}

/// Bootstrap state of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// S0: local state not yet inspected
    Uninitialized,
    /// S1: key pair generated and address published
    KeyGenerated,
    /// S2: genesis with every funded account assembled (leader) or imported
    GenesisAssembled,
    /// S3: own gentx produced and published
    GentxProduced,
    /// S4: final genesis collected (leader) or imported
    GenesisFinalized,
    /// S5: node id published and persistent peers configured
    PeerDiscovery,
    /// S6: follower waits for the leader's setup to complete
    Ready,
    /// S7: node process started
    Running,
    /// The node gave up: coordination stall or failed command
    Aborted,
}

impl NodeState {
    /// Next state for `role`, given what the node found locally.
    ///
    /// `local` only matters when leaving `Uninitialized`.
    pub fn successor(self, role: Role, local: LocalChainState) -> Option<NodeState> {
        use NodeState::*;
        match self {
            Uninitialized => Some(match local {
                LocalChainState::Fresh => KeyGenerated,
                LocalChainState::Initialized => PeerDiscovery,
            }),
            KeyGenerated => Some(GenesisAssembled),
            GenesisAssembled => Some(GentxProduced),
            GentxProduced => Some(GenesisFinalized),
            GenesisFinalized => Some(PeerDiscovery),
            PeerDiscovery => Some(match role {
                Role::Leader => Running,
                Role::Follower => Ready,
            }),
            Ready => Some(Running),
            Running | Aborted => None,
        }
    }

    /// States visited after `Uninitialized`, in order, ending at `Running`
    pub fn path(role: Role, local: LocalChainState) -> Vec<NodeState> {
        let mut path = Vec::new();
        let mut current = NodeState::Uninitialized;
        while let Some(next) = current.successor(role, local) {
            path.push(next);
            current = next;
        }
        path
    }

    /// Whether no transition leaves this state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Aborted)
    }

    /// Whether this state belongs to first-time initialization only
    pub fn is_cold_start_only(self) -> bool {
        matches!(
            self,
            Self::KeyGenerated | Self::GenesisAssembled | Self::GentxProduced | Self::GenesisFinalized
        )
    }

    /// Short `S<n>` label
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "S0",
            Self::KeyGenerated => "S1",
            Self::GenesisAssembled => "S2",
            Self::GentxProduced => "S3",
            Self::GenesisFinalized => "S4",
            Self::PeerDiscovery => "S5",
            Self::Ready => "S6",
            Self::Running => "S7",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::KeyGenerated => "key_generated",
            Self::GenesisAssembled => "genesis_assembled",
            Self::GentxProduced => "gentx_produced",
            Self::GenesisFinalized => "genesis_finalized",
            Self::PeerDiscovery => "peer_discovery",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Aborted => "aborted",
        };
        write!(f, "{} ({name})", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NodeState::*;

    #[test]
    fn test_cold_start_paths() {
        assert_eq!(
            NodeState::path(Role::Leader, LocalChainState::Fresh),
            vec![
                KeyGenerated,
                GenesisAssembled,
                GentxProduced,
                GenesisFinalized,
                PeerDiscovery,
                Running
            ]
        );
        assert_eq!(
            NodeState::path(Role::Follower, LocalChainState::Fresh),
            vec![
                KeyGenerated,
                GenesisAssembled,
                GentxProduced,
                GenesisFinalized,
                PeerDiscovery,
                Ready,
                Running
            ]
        );
    }

    #[test]
    fn test_warm_restart_skips_to_peer_discovery() {
        assert_eq!(
            NodeState::path(Role::Leader, LocalChainState::Initialized),
            vec![PeerDiscovery, Running]
        );
        assert_eq!(
            NodeState::path(Role::Follower, LocalChainState::Initialized),
            vec![PeerDiscovery, Ready, Running]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(Running.is_terminal());
        assert!(Aborted.is_terminal());
        assert_eq!(Aborted.successor(Role::Leader, LocalChainState::Fresh), None);
        assert!(!Ready.is_terminal());
    }
}
