//! Network fixtures

use bootnet_core::{
    BinaryConfig, DeploymentSettings, GlobalConfig, NetworkConfig, Result, SignalKey,
    TokenAllocation, ValidatorConfig, ValidatorName,
};
use bootnet_protocol::BootstrapPlan;
use std::collections::BTreeSet;

/// Chain settings used by every fixture network
pub fn global_config() -> GlobalConfig {
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

/// Validator at position `index` with host ports offset from the defaults
pub fn validator_config(name: &str, index: u16, amount: &str) -> ValidatorConfig {
    ValidatorConfig {
        name: ValidatorName::new_unchecked(name),
        moniker: name.to_string(),
        key_name: format!("{name}key"),
        port: 26656 + index * 10,
        rpc_port: 26657 + index * 10,
        rest_port: 1317 + index,
        grpc_port: 9090 + index,
        tokens: TokenAllocation {
            stake: format!("{amount}stake"),
            token: format!("{amount}token"),
            gentx_stake: format!("{amount}stake"),
        },
    }
}

/// Network of the named validators, first one leading
pub fn network_of(names: &[&str]) -> Result<NetworkConfig> {
    let validators = names
        .iter()
        .enumerate()
        .map(|(i, name)| validator_config(name, i as u16, "100000000"))
        .collect();
    NetworkConfig::new(global_config(), validators, DeploymentSettings::default())
}

/// Network of `val1` through `val<count>`
pub fn network(count: usize) -> Result<NetworkConfig> {
    let names: Vec<String> = (1..=count).map(|i| format!("val{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    network_of(&names)
}

/// Every signal any validator of `network` references, in key order
pub fn network_signals(network: &NetworkConfig) -> Result<Vec<SignalKey>> {
    let mut keys = BTreeSet::new();
    for plan in BootstrapPlan::for_network(network)? {
        keys.extend(plan.referenced_signals());
    }
    Ok(keys.into_iter().collect())
}
