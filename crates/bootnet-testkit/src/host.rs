//! In-memory node binary
//!
//! [`FakeNodeHost`] keeps a node's home directory in memory and interprets
//! node commands with just enough chain semantics to catch ordering bugs:
//! a gentx needs the validator's own funded account, collection needs the
//! gentx of every funded validator, and start needs a collected genesis.

use async_trait::async_trait;
use bootnet_core::{BootstrapError, LocalFile, NodeLayout, Result, ValidatorName};
use bootnet_protocol::host::{set_config_value, MINIMUM_GAS_PRICES_KEY, PERSISTENT_PEERS_KEY};
use bootnet_protocol::{LocalChainState, NodeCommand, NodeHost};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Funded genesis account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeAccount {
    /// Account address
    pub address: String,
    /// Coins, as passed to `add-genesis-account`
    pub coins: String,
}

/// Genesis transaction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FakeGentx {
    /// Bonding validator's address
    pub address: String,
    /// Self-bond amount
    pub amount: String,
    /// Chain the gentx was signed for
    pub chain_id: String,
}

/// Genesis document written by the fake binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeGenesis {
    /// Chain identifier
    pub chain_id: String,
    /// Funded accounts, in insertion order
    pub accounts: Vec<FakeAccount>,
    /// Collected gentxs, sorted
    pub gen_txs: Vec<FakeGentx>,
}

#[derive(Debug, Default)]
struct FakeNode {
    files: BTreeMap<String, Vec<u8>>,
    has_key: bool,
    commands: Vec<String>,
    launches: usize,
}

/// Node host backed by memory
#[derive(Debug, Clone)]
pub struct FakeNodeHost {
    validator: ValidatorName,
    layout: NodeLayout,
    node_id: String,
    address: String,
    fail_on: Option<String>,
    node: Arc<Mutex<FakeNode>>,
}

fn fingerprint(label: &str, name: &ValidatorName, len: usize) -> String {
    let digest = blake3::hash(format!("{label}:{name}").as_bytes());
    let mut text = hex::encode(digest.as_bytes());
    text.truncate(len);
    text
}

impl FakeNodeHost {
    /// Fresh node for `validator` with home `layout`
    pub fn new(validator: ValidatorName, layout: NodeLayout) -> Self {
        Self {
            node_id: fingerprint("node", &validator, 40),
            address: format!("blog1{}", fingerprint("account", &validator, 38)),
            validator,
            layout,
            fail_on: None,
            node: Arc::new(Mutex::new(FakeNode::default())),
        }
    }

    /// Make every command whose arguments contain `needle` exit non-zero
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Validator this node belongs to
    pub fn validator(&self) -> &ValidatorName {
        &self.validator
    }

    /// Node id printed by `tendermint show-node-id`
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Address printed by `keys show -a`
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Every command line run so far, without the binary name
    pub async fn commands(&self) -> Vec<String> {
        self.node.lock().await.commands.clone()
    }

    /// How many times the node process was launched
    pub async fn launches(&self) -> usize {
        self.node.lock().await.launches
    }

    /// Current local genesis, if any
    pub async fn genesis(&self) -> Option<FakeGenesis> {
        let node = self.node.lock().await;
        let raw = node.files.get(&self.layout.path(&LocalFile::Genesis))?;
        serde_json::from_slice(raw).ok()
    }

    /// Text of a local file, if present
    pub async fn file_text(&self, file: &LocalFile) -> Option<String> {
        let node = self.node.lock().await;
        node.files
            .get(&self.layout.path(file))
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
    }

    /// Value of `persistent_peers` in the network config
    pub async fn persistent_peers(&self) -> Option<String> {
        let config = self.file_text(&LocalFile::NetworkConfig).await?;
        config.lines().find_map(|line| {
            line.strip_prefix(PERSISTENT_PEERS_KEY)
                .and_then(|rest| rest.trim_start().strip_prefix('='))
                .map(|value| value.trim().trim_matches('"').to_string())
        })
    }

    fn fail(args: &[String], message: impl Into<String>) -> BootstrapError {
        BootstrapError::command_failed(args.join(" "), "exit status: 1", message)
    }

    fn path(&self, file: &LocalFile) -> String {
        self.layout.path(file)
    }

    fn read_genesis(&self, node: &FakeNode, args: &[String]) -> Result<FakeGenesis> {
        let raw = node
            .files
            .get(&self.path(&LocalFile::Genesis))
            .ok_or_else(|| Self::fail(args, "genesis file not found"))?;
        serde_json::from_slice(raw).map_err(|e| Self::fail(args, format!("invalid genesis: {e}")))
    }

    fn write_genesis(&self, node: &mut FakeNode, genesis: &FakeGenesis) -> Result<()> {
        let raw = serde_json::to_vec_pretty(genesis)
            .map_err(|e| BootstrapError::internal(format!("genesis serialization: {e}")))?;
        node.files.insert(self.path(&LocalFile::Genesis), raw);
        Ok(())
    }

    fn gentx_files(&self, node: &FakeNode) -> Vec<(String, Vec<u8>)> {
        let dir = format!("{}/", self.path(&LocalFile::GentxDir));
        node.files
            .iter()
            .filter(|(path, _)| path.starts_with(&dir) && path.ends_with(".json"))
            .map(|(path, raw)| (path.clone(), raw.clone()))
            .collect()
    }

    fn execute(&self, node: &mut FakeNode, command: &NodeCommand, args: &[String]) -> Result<String> {
        match command {
            NodeCommand::Init { chain_id, .. } => {
                let genesis = FakeGenesis {
                    chain_id: chain_id.clone(),
                    ..FakeGenesis::default()
                };
                self.write_genesis(node, &genesis)?;
                node.files.insert(
                    self.path(&LocalFile::ValidatorKey),
                    format!("{{\"node_id\":\"{}\"}}", self.node_id).into_bytes(),
                );
                node.files.insert(
                    self.path(&LocalFile::NetworkConfig),
                    b"[p2p]\npersistent_peers = \"\"\n".to_vec(),
                );
                node.files.insert(
                    self.path(&LocalFile::AppConfig),
                    b"minimum-gas-prices = \"\"\n".to_vec(),
                );
                Ok(String::new())
            }
            NodeCommand::KeysAdd { .. } => {
                node.has_key = true;
                Ok(String::new())
            }
            NodeCommand::KeysShowAddress { key_name, .. } => {
                if !node.has_key {
                    return Err(Self::fail(args, format!("{key_name}: key not found")));
                }
                Ok(format!("{}\n", self.address))
            }
            NodeCommand::AddGenesisAccount { coins, .. } => {
                let address = args
                    .get(2)
                    .filter(|address| !address.is_empty())
                    .ok_or_else(|| Self::fail(args, "missing address"))?;
                let mut genesis = self.read_genesis(node, args)?;
                if genesis.accounts.iter().any(|a| &a.address == address) {
                    return Err(Self::fail(args, "account already exists"));
                }
                genesis.accounts.push(FakeAccount {
                    address: address.clone(),
                    coins: coins.clone(),
                });
                self.write_genesis(node, &genesis)?;
                Ok(String::new())
            }
            NodeCommand::Gentx {
                amount, chain_id, ..
            } => {
                if !node.has_key {
                    return Err(Self::fail(args, "key not found"));
                }
                let genesis = self.read_genesis(node, args)?;
                if genesis.chain_id != *chain_id {
                    return Err(Self::fail(args, "chain id mismatch"));
                }
                if !genesis.accounts.iter().any(|a| a.address == self.address) {
                    return Err(Self::fail(args, "account not found in genesis"));
                }
                let gentx = FakeGentx {
                    address: self.address.clone(),
                    amount: amount.clone(),
                    chain_id: chain_id.clone(),
                };
                let raw = serde_json::to_vec(&gentx)
                    .map_err(|e| BootstrapError::internal(format!("gentx serialization: {e}")))?;
                node.files.insert(
                    format!("{}/gentx-{}.json", self.path(&LocalFile::GentxDir), self.node_id),
                    raw,
                );
                Ok(String::new())
            }
            NodeCommand::CollectGentxs => {
                let mut genesis = self.read_genesis(node, args)?;
                let mut gen_txs = Vec::new();
                for (path, raw) in self.gentx_files(node) {
                    let gentx: FakeGentx = serde_json::from_slice(&raw)
                        .map_err(|e| Self::fail(args, format!("{path}: {e}")))?;
                    if gentx.chain_id != genesis.chain_id {
                        return Err(Self::fail(args, format!("{path}: chain id mismatch")));
                    }
                    if !genesis.accounts.iter().any(|a| a.address == gentx.address) {
                        return Err(Self::fail(args, format!("{path}: account not in genesis")));
                    }
                    gen_txs.push(gentx);
                }
                for account in &genesis.accounts {
                    if !gen_txs.iter().any(|g| g.address == account.address) {
                        return Err(Self::fail(
                            args,
                            format!("no gentx for account {}", account.address),
                        ));
                    }
                }
                gen_txs.sort();
                genesis.gen_txs = gen_txs;
                self.write_genesis(node, &genesis)?;
                Ok(String::new())
            }
            NodeCommand::ShowNodeId => {
                if !node.files.contains_key(&self.path(&LocalFile::ValidatorKey)) {
                    return Err(Self::fail(args, "node key not found"));
                }
                Ok(format!("{}\n", self.node_id))
            }
            NodeCommand::Start { .. } => {
                let genesis = self.read_genesis(node, args)?;
                if genesis.gen_txs.is_empty() {
                    return Err(Self::fail(args, "genesis has no validators"));
                }
                node.launches += 1;
                Ok(String::new())
            }
        }
    }
}

#[async_trait]
impl NodeHost for FakeNodeHost {
    async fn local_state(&self) -> Result<LocalChainState> {
        let node = self.node.lock().await;
        let initialized = NodeLayout::initialized_markers()
            .iter()
            .all(|marker| node.files.contains_key(&self.path(marker)));
        Ok(if initialized {
            LocalChainState::Initialized
        } else {
            LocalChainState::Fresh
        })
    }

    async fn run(&self, command: &NodeCommand, args: &[String]) -> Result<String> {
        let mut node = self.node.lock().await;
        node.commands.push(args.join(" "));
        if let Some(needle) = &self.fail_on {
            if args.join(" ").contains(needle.as_str()) {
                return Err(Self::fail(args, "injected failure"));
            }
        }
        self.execute(&mut node, command, args)
    }

    async fn launch(&self, command: &NodeCommand, args: &[String]) -> Result<()> {
        self.run(command, args).await.map(|_| ())
    }

    async fn read_local(&self, file: &LocalFile) -> Result<Vec<u8>> {
        let node = self.node.lock().await;
        let found = match file {
            LocalFile::OwnGentx => self.gentx_files(&node).into_iter().next().map(|(_, raw)| raw),
            other => node.files.get(&self.path(other)).cloned(),
        };
        found.ok_or_else(|| BootstrapError::storage(format!("{file} not found")))
    }

    async fn write_local(&self, file: &LocalFile, content: &[u8]) -> Result<()> {
        self.node
            .lock()
            .await
            .files
            .insert(self.path(file), content.to_vec());
        Ok(())
    }

    async fn ensure_dir(&self, _dir: &LocalFile) -> Result<()> {
        Ok(())
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

impl FakeNodeHost {
    async fn edit(&self, file: LocalFile, key: &str, value: &str) -> Result<()> {
        let mut node = self.node.lock().await;
        let path = self.path(&file);
        let current = node
            .files
            .get(&path)
            .ok_or_else(|| BootstrapError::storage(format!("{file} not found")))?;
        let edited = set_config_value(&String::from_utf8_lossy(current), key, value)?;
        node.files.insert(path, edited.into_bytes());
        Ok(())
    }
}
