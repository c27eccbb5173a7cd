//! Per-validator bootstrap plan
//!
//! A [`BootstrapPlan`] is the complete, ordered list of steps one validator
//! performs, grouped into phases. Each phase ends in the [`NodeState`] it
//! reaches. The plan is pure data: the script renderer prints it and the
//! native driver executes it, so both interpreters agree on signal names,
//! ordering and peer enumeration.

use crate::command::{AccountRef, NodeCommand};
use crate::state::{LocalChainState, NodeState};
use crate::time::WaitPolicy;
use bootnet_core::{
    BinaryConfig, BootstrapError, ConfigValidator, DeploymentSettings, FieldClass, GlobalConfig,
    LocalFile, NetworkConfig, NodeLayout, Result, Role, SignalKey, Validate, ValidatorConfig,
    ValidatorName, ValidatorSet,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Output of a node binary call kept for later steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Captured {
    /// Account address from `keys show -a`
    Address,
    /// Node id from `tendermint show-node-id`
    NodeId,
}

/// One entry of the persistent peer list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Peer validator; its node id comes from `nodeid[name]`
    pub name: ValidatorName,
    /// Network host of the peer
    pub host: String,
    /// P2P port of the peer inside the network
    pub port: u16,
}

impl PeerEntry {
    /// Signal carrying this peer's node id
    pub fn node_id_signal(&self) -> SignalKey {
        SignalKey::NodeId(self.name.clone())
    }

    /// `<node-id>@<host>:<port>`
    pub fn render(&self, node_id: &str) -> String {
        format!("{}@{}:{}", node_id.trim(), self.host, self.port)
    }
}

/// Comma-separated persistent peer string, in entry order
pub fn persistent_peers(peers: &[PeerEntry], node_id: impl Fn(&PeerEntry) -> String) -> String {
    peers
        .iter()
        .map(|peer| peer.render(&node_id(peer)))
        .collect::<Vec<_>>()
        .join(",")
}

/// A single protocol step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum Step {
    /// Invoke the node binary and discard its output
    Run {
        /// Invocation
        command: NodeCommand,
    },
    /// Invoke the node binary and keep its trimmed stdout
    Capture {
        /// What the output is
        output: Captured,
        /// Invocation
        command: NodeCommand,
    },
    /// Publish a captured value
    PublishValue {
        /// Target signal
        key: SignalKey,
        /// Captured value to publish
        value: Captured,
    },
    /// Publish a copy of a local file
    PublishFile {
        /// Target signal
        key: SignalKey,
        /// Local source
        file: LocalFile,
    },
    /// Publish a pure presence marker
    PublishMarker {
        /// Target signal
        key: SignalKey,
    },
    /// Block until every key is present
    Await {
        /// Guard signals
        keys: Vec<SignalKey>,
    },
    /// Copy a published signal into local chain state
    Import {
        /// Source signal
        key: SignalKey,
        /// Local destination
        file: LocalFile,
    },
    /// Create a local directory if absent
    EnsureDir {
        /// Directory to create
        dir: LocalFile,
    },
    /// Rewrite `persistent_peers` in the network config
    ConfigurePeers {
        /// Every other validator, in set order
        peers: Vec<PeerEntry>,
    },
    /// Rewrite `minimum-gas-prices` in the application config
    SetMinimumGasPrices {
        /// Gas price
        price: String,
    },
}

impl Step {
    /// Signals this step reads, writes or waits on
    pub fn signals(&self) -> Vec<SignalKey> {
        match self {
            Self::PublishValue { key, .. }
            | Self::PublishFile { key, .. }
            | Self::PublishMarker { key }
            | Self::Import { key, .. } => vec![key.clone()],
            Self::Await { keys } => keys.clone(),
            Self::ConfigurePeers { peers } => peers.iter().map(PeerEntry::node_id_signal).collect(),
            Self::Run { command } | Self::Capture { command, .. } => match command {
                NodeCommand::AddGenesisAccount {
                    account: AccountRef::Published(name),
                    ..
                } => vec![SignalKey::Address(name.clone())],
                _ => Vec::new(),
            },
            Self::EnsureDir { .. } | Self::SetMinimumGasPrices { .. } => Vec::new(),
        }
    }

    /// Signal this step publishes, if any
    pub fn published(&self) -> Option<&SignalKey> {
        match self {
            Self::PublishValue { key, .. }
            | Self::PublishFile { key, .. }
            | Self::PublishMarker { key } => Some(key),
            _ => None,
        }
    }

    fn run(command: NodeCommand) -> Self {
        Self::Run { command }
    }
}

fn validate_signal(validator: &mut ConfigValidator, field_name: &str, key: &SignalKey) {
    if let SignalKey::Address(owner) | SignalKey::NodeId(owner) | SignalKey::Gentx(owner) = key {
        validator.field(field_name, owner.as_str(), FieldClass::Identifier);
    }
}

fn validate_file(validator: &mut ConfigValidator, field_name: &str, file: &LocalFile) {
    if let LocalFile::ImportedGentx(owner) = file {
        validator.field(field_name, owner.as_str(), FieldClass::Identifier);
    }
}

impl Validate for Step {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        match self {
            Self::Run { command } | Self::Capture { command, .. } => {
                let mut nested = validator.for_field("command");
                command.validate_into(&mut nested);
                validator.merge(nested);
            }
            Self::PublishValue { key, .. } | Self::PublishMarker { key } => {
                validate_signal(validator, "key", key);
            }
            Self::PublishFile { key, file } | Self::Import { key, file } => {
                validate_signal(validator, "key", key);
                validate_file(validator, "file", file);
            }
            Self::Await { keys } => {
                validator.each("keys", keys, |v, _, key| validate_signal(v, "owner", key));
            }
            Self::EnsureDir { dir } => validate_file(validator, "dir", dir),
            Self::ConfigurePeers { peers } => {
                validator.each("peers", peers, |v, _, peer| {
                    v.field("name", peer.name.as_str(), FieldClass::Identifier)
                        .field("host", &peer.host, FieldClass::Identifier)
                        .port("port", peer.port);
                });
            }
            Self::SetMinimumGasPrices { price } => {
                validator.field("price", price, FieldClass::Value);
            }
        }
    }
}

/// Steps that together reach `state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// State reached once every step completed
    pub state: NodeState,
    /// Ordered steps
    pub steps: Vec<Step>,
}

impl Phase {
    fn new(state: NodeState) -> Self {
        Self {
            state,
            steps: Vec::new(),
        }
    }

    fn push(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Adds an `Await` step unless `keys` is empty
    fn await_all(&mut self, keys: Vec<SignalKey>) -> &mut Self {
        if !keys.is_empty() {
            self.steps.push(Step::Await { keys });
        }
        self
    }
}

/// Complete bootstrap plan for one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapPlan {
    /// Validator executing the plan
    pub validator: ValidatorName,
    /// Its role in the set
    pub role: Role,
    /// Node binary identity
    pub binary: BinaryConfig,
    /// Node home layout
    pub layout: NodeLayout,
    /// Mount point of the shared signal directory
    pub shared_dir: String,
    /// Polling and timeout
    pub wait: WaitPolicy,
    /// Every phase, from `KeyGenerated` to `Running`
    phases: Vec<Phase>,
}

impl BootstrapPlan {
    /// Plan for `name` within `set`.
    ///
    /// Fails when `name` is not a member of the set or when any input field
    /// breaks its character policy.
    pub fn build(
        set: &ValidatorSet,
        name: &ValidatorName,
        global: &GlobalConfig,
        settings: &DeploymentSettings,
    ) -> Result<Self> {
        let mut inputs = ConfigValidator::new();
        global.validate_into(&mut inputs);
        settings.validate_into(&mut inputs);
        set.as_slice().validate_into(&mut inputs);
        inputs.finish()?;

        let role = set.role_of(name).ok_or_else(|| {
            BootstrapError::config(format!("validator '{name}' is not in the validator set"))
        })?;
        let me = set
            .get(name.as_str())
            .ok_or_else(|| BootstrapError::internal(format!("validator '{name}' vanished")))?;

        let phases = PlanBuilder {
            set,
            me,
            role,
            global,
            settings,
        }
        .phases();

        Ok(Self {
            validator: name.clone(),
            role,
            binary: global.binary.clone(),
            layout: NodeLayout::new(global.data_dir.clone()),
            shared_dir: settings.shared_dir.clone(),
            wait: WaitPolicy::from_settings(settings),
            phases,
        })
    }

    /// Plan for the validator named `name` in a loaded network
    pub fn for_validator(network: &NetworkConfig, name: &str) -> Result<Self> {
        let validator = network.validators.get(name).ok_or_else(|| {
            BootstrapError::config(format!("validator '{name}' is not in the validator set"))
        })?;
        Self::build(
            &network.validators,
            &validator.name,
            &network.global,
            &network.settings,
        )
    }

    /// Plans for every validator, in set order
    pub fn for_network(network: &NetworkConfig) -> Result<Vec<Self>> {
        network
            .validators
            .iter()
            .map(|v| {
                Self::build(
                    &network.validators,
                    &v.name,
                    &network.global,
                    &network.settings,
                )
            })
            .collect()
    }

    /// Phases executed from the given local state
    pub fn phases(&self, local: LocalChainState) -> impl Iterator<Item = &Phase> {
        self.phases.iter().filter(move |phase| {
            local == LocalChainState::Fresh || !phase.state.is_cold_start_only()
        })
    }

    /// Every phase, cold start included
    pub fn all_phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Phase reaching `state`, if the plan has one
    pub fn phase(&self, state: NodeState) -> Option<&Phase> {
        self.phases.iter().find(|phase| phase.state == state)
    }

    /// Every signal any step references
    pub fn referenced_signals(&self) -> BTreeSet<SignalKey> {
        self.phases
            .iter()
            .flat_map(|phase| phase.steps.iter())
            .flat_map(Step::signals)
            .collect()
    }

    /// Peers configured during peer discovery
    pub fn peers(&self) -> &[PeerEntry] {
        self.phases
            .iter()
            .flat_map(|phase| phase.steps.iter())
            .find_map(|step| match step {
                Step::ConfigurePeers { peers } => Some(peers.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

impl Validate for BootstrapPlan {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        let mut plan = validator.for_field("plan");
        plan.field("validator", self.validator.as_str(), FieldClass::Identifier)
            .field("binary.name", &self.binary.name, FieldClass::Value)
            .optional_field("binary.path", &self.binary.path, FieldClass::AbsolutePath)
            .field("data_dir", self.layout.home(), FieldClass::AbsolutePath)
            .field("shared_dir", &self.shared_dir, FieldClass::AbsolutePath);
        for (p, phase) in self.phases.iter().enumerate() {
            plan.each(&format!("phases[{p}].steps"), &phase.steps, |v, _, step| {
                step.validate_into(v)
            });
        }
        validator.merge(plan);
    }
}

struct PlanBuilder<'a> {
    set: &'a ValidatorSet,
    me: &'a ValidatorConfig,
    role: Role,
    global: &'a GlobalConfig,
    settings: &'a DeploymentSettings,
}

impl PlanBuilder<'_> {
    fn phases(&self) -> Vec<Phase> {
        let mut phases = vec![
            self.key_generated(),
            self.genesis_assembled(),
            self.gentx_produced(),
            self.genesis_finalized(),
            self.peer_discovery(),
        ];
        if !self.role.is_leader() {
            phases.push(self.ready());
        }
        phases.push(self.running());
        phases
    }

    fn followers(&self) -> impl Iterator<Item = &ValidatorConfig> {
        self.set.followers()
    }

    fn key_generated(&self) -> Phase {
        let me = self.me;
        let mut phase = Phase::new(NodeState::KeyGenerated);
        phase
            .push(Step::run(NodeCommand::Init {
                moniker: me.moniker.clone(),
                chain_id: self.global.chain_id.clone(),
            }))
            .push(Step::run(NodeCommand::KeysAdd {
                key_name: me.key_name.clone(),
                keyring_backend: self.global.keyring_backend.clone(),
            }))
            .push(Step::Capture {
                output: Captured::Address,
                command: NodeCommand::KeysShowAddress {
                    key_name: me.key_name.clone(),
                    keyring_backend: self.global.keyring_backend.clone(),
                },
            })
            .push(Step::PublishValue {
                key: SignalKey::Address(me.name.clone()),
                value: Captured::Address,
            });
        phase
    }

    fn genesis_assembled(&self) -> Phase {
        let mut phase = Phase::new(NodeState::GenesisAssembled);
        match self.role {
            Role::Leader => {
                phase
                    .await_all(
                        self.followers()
                            .map(|w| SignalKey::Address(w.name.clone()))
                            .collect(),
                    )
                    .push(Step::run(NodeCommand::AddGenesisAccount {
                        account: AccountRef::Own,
                        coins: self.me.tokens.genesis_coins(),
                    }));
                for follower in self.followers() {
                    phase.push(Step::run(NodeCommand::AddGenesisAccount {
                        account: AccountRef::Published(follower.name.clone()),
                        coins: follower.tokens.genesis_coins(),
                    }));
                }
                phase
                    .push(Step::PublishFile {
                        key: SignalKey::Genesis,
                        file: LocalFile::Genesis,
                    })
                    .push(Step::PublishMarker {
                        key: SignalKey::GenesisAccountsReady,
                    });
            }
            Role::Follower => {
                phase
                    .await_all(vec![SignalKey::GenesisAccountsReady])
                    .push(Step::Import {
                        key: SignalKey::Genesis,
                        file: LocalFile::Genesis,
                    });
            }
        }
        phase
    }

    fn gentx_produced(&self) -> Phase {
        let me = self.me;
        let mut phase = Phase::new(NodeState::GentxProduced);
        phase
            .push(Step::run(NodeCommand::Gentx {
                key_name: me.key_name.clone(),
                amount: me.tokens.gentx_stake.clone(),
                chain_id: self.global.chain_id.clone(),
                keyring_backend: self.global.keyring_backend.clone(),
            }))
            .push(Step::PublishFile {
                key: SignalKey::Gentx(me.name.clone()),
                file: LocalFile::OwnGentx,
            });
        phase
    }

    fn genesis_finalized(&self) -> Phase {
        let mut phase = Phase::new(NodeState::GenesisFinalized);
        match self.role {
            Role::Leader => {
                phase
                    .await_all(
                        self.followers()
                            .map(|w| SignalKey::Gentx(w.name.clone()))
                            .collect(),
                    )
                    .push(Step::EnsureDir {
                        dir: LocalFile::GentxDir,
                    });
                for follower in self.followers() {
                    phase.push(Step::Import {
                        key: SignalKey::Gentx(follower.name.clone()),
                        file: LocalFile::ImportedGentx(follower.name.clone()),
                    });
                }
                phase
                    .push(Step::run(NodeCommand::CollectGentxs))
                    .push(Step::PublishFile {
                        key: SignalKey::FinalGenesis,
                        file: LocalFile::Genesis,
                    })
                    .push(Step::PublishMarker {
                        key: SignalKey::SetupComplete,
                    });
            }
            Role::Follower => {
                phase
                    .await_all(vec![SignalKey::FinalGenesis])
                    .push(Step::Import {
                        key: SignalKey::FinalGenesis,
                        file: LocalFile::Genesis,
                    });
            }
        }
        phase
    }

    fn peer_discovery(&self) -> Phase {
        let me = &self.me.name;
        let peers: Vec<PeerEntry> = self
            .set
            .others(me)
            .map(|w| PeerEntry {
                name: w.name.clone(),
                host: w.name.to_string(),
                port: self.settings.container_ports.p2p,
            })
            .collect();

        let mut phase = Phase::new(NodeState::PeerDiscovery);
        phase
            .push(Step::Capture {
                output: Captured::NodeId,
                command: NodeCommand::ShowNodeId,
            })
            .push(Step::PublishValue {
                key: SignalKey::NodeId(me.clone()),
                value: Captured::NodeId,
            })
            .await_all(peers.iter().map(PeerEntry::node_id_signal).collect())
            .push(Step::ConfigurePeers { peers })
            .push(Step::SetMinimumGasPrices {
                price: self.global.gas_price.clone(),
            });
        phase
    }

    fn ready(&self) -> Phase {
        let mut phase = Phase::new(NodeState::Ready);
        phase.await_all(vec![SignalKey::SetupComplete]);
        phase
    }

    fn running(&self) -> Phase {
        let mut phase = Phase::new(NodeState::Running);
        phase.push(Step::run(NodeCommand::Start {
            minimum_gas_prices: self.global.gas_price.clone(),
        }));
        phase
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use assert_matches::assert_matches;
    use bootnet_core::{TokenAllocation, ValidatorConfig};

    fn validator(name: &str, index: u16, stake: &str) -> ValidatorConfig {
        ValidatorConfig {
            name: ValidatorName::new_unchecked(name),
            moniker: name.to_string(),
            key_name: format!("{name}key"),
            port: 26656 + index * 10,
            rpc_port: 26657 + index * 10,
            rest_port: 1317 + index,
            grpc_port: 9090 + index,
            tokens: TokenAllocation {
                stake: format!("{stake}stake"),
                token: format!("{stake}token"),
                gentx_stake: format!("{stake}stake"),
            },
        }
    }

    fn global() -> GlobalConfig {
        GlobalConfig {
            chain_id: "blog-testnet".to_string(),
            keyring_backend: "test".to_string(),
            gas_price: "0.00001stake".to_string(),
            data_dir: "/root/.blog".to_string(),
            binary: BinaryConfig {
                name: "blogd".to_string(),
                path: String::new(),
            },
        }
    }

    fn set(names: &[&str]) -> ValidatorSet {
        ValidatorSet::new(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| validator(n, i as u16, "100"))
                .collect(),
        )
        .unwrap()
    }

    fn plan(set: &ValidatorSet, name: &str) -> BootstrapPlan {
        BootstrapPlan::build(
            set,
            &ValidatorName::new_unchecked(name),
            &global(),
            &DeploymentSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_phase_states_follow_transition_relation() {
        let set = set(&["a", "b", "c"]);
        for name in ["a", "b", "c"] {
            let plan = plan(&set, name);
            for local in [LocalChainState::Fresh, LocalChainState::Initialized] {
                let states: Vec<_> = plan.phases(local).map(|p| p.state).collect();
                assert_eq!(states, NodeState::path(plan.role, local));
            }
        }
    }

    #[test]
    fn test_leader_funds_self_first_then_followers_in_order() {
        let set = set(&["a", "b", "c"]);
        let plan = plan(&set, "a");
        let phase = plan.phase(NodeState::GenesisAssembled).unwrap();
        let accounts: Vec<_> = phase
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Run {
                    command: NodeCommand::AddGenesisAccount { account, .. },
                } => Some(account.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            accounts,
            vec![
                AccountRef::Own,
                AccountRef::Published(ValidatorName::new_unchecked("b")),
                AccountRef::Published(ValidatorName::new_unchecked("c")),
            ]
        );
        // genesis is published before the ready marker
        let published: Vec<_> = phase.steps.iter().filter_map(Step::published).collect();
        assert_eq!(
            published,
            vec![&SignalKey::Genesis, &SignalKey::GenesisAccountsReady]
        );
    }

    #[test]
    fn test_peers_exclude_self_in_set_order() {
        let set = set(&["a", "b", "c"]);
        let plan = plan(&set, "b");
        let names: Vec<_> = plan.peers().iter().map(|p| p.name.to_string()).collect();
        assert_eq!(names, vec!["a", "c"]);
        let peers = persistent_peers(plan.peers(), |p| format!("id-{}", p.name));
        assert_eq!(peers, "id-a@a:26656,id-c@c:26656");
    }

    #[test]
    fn test_single_validator_has_no_waits() {
        let set = set(&["solo"]);
        let plan = plan(&set, "solo");
        assert_eq!(plan.role, Role::Leader);
        assert!(plan
            .all_phases()
            .iter()
            .flat_map(|p| p.steps.iter())
            .all(|s| !matches!(s, Step::Await { .. })));
        assert!(plan.peers().is_empty());
    }

    #[test]
    fn test_referenced_signals_derive_from_set_names() {
        let set = set(&["a", "b", "c"]);
        for v in &set {
            let plan = plan(&set, v.name.as_str());
            for key in plan.referenced_signals() {
                if let Some(owner) = key.owner() {
                    assert!(set.contains(owner), "{key} names unknown validator");
                }
            }
        }
    }

    #[test]
    fn test_unknown_validator_rejected() {
        let set = set(&["a"]);
        let err = BootstrapPlan::build(
            &set,
            &ValidatorName::new_unchecked("zz"),
            &global(),
            &DeploymentSettings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not in the validator set"));
    }

    #[test]
    fn test_build_rejects_unsafe_inputs() {
        let set = set(&["a", "b"]);
        let mut global = global();
        global.chain_id = "x\"; rm -rf / #".to_string();
        let err = BootstrapPlan::build(
            &set,
            &ValidatorName::new_unchecked("a"),
            &global,
            &DeploymentSettings::default(),
        )
        .unwrap_err();
        assert_matches!(err, BootstrapError::Validation { ref issues } if issues.iter().any(|i| i.field == "global.chain_id"));

        let mut settings = DeploymentSettings::default();
        settings.shared_dir = "/shared/$(id)".to_string();
        let err = BootstrapPlan::build(&set, &ValidatorName::new_unchecked("a"), &self::global(), &settings)
            .unwrap_err();
        assert!(err.to_string().contains("settings.shared_dir"), "{err}");
    }

    #[test]
    fn test_plan_validation_reaches_steps() {
        let set = set(&["a", "b"]);
        let mut plan = plan(&set, "a");
        assert!(plan.validate().is_ok());

        let genesis = plan
            .phases
            .iter()
            .position(|phase| phase.state == NodeState::GenesisAssembled)
            .unwrap();
        plan.phases[genesis].steps.push(Step::SetMinimumGasPrices {
            price: "1stake; reboot".to_string(),
        });
        let err = plan.validate().unwrap_err().to_string();
        assert!(err.contains(&format!("plan.phases[{genesis}].steps[")), "{err}");
        assert!(err.contains("].price"), "{err}");

        let mut plan = self::plan(&set, "a");
        plan.binary.name = "blogd'".to_string();
        let err = plan.validate().unwrap_err().to_string();
        assert!(err.contains("plan.binary.name"), "{err}");
    }
}
