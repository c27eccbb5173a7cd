//! `bootnet check`

use super::ConfigArgs;
use anyhow::Result;
use bootnet_core::NetworkConfig;

/// One-line summary of a validated network
pub fn summary(network: &NetworkConfig) -> String {
    let followers: Vec<String> = network
        .validators
        .followers()
        .map(|v| v.name.to_string())
        .collect();
    format!(
        "chain {}: leader {}, followers [{}]",
        network.global.chain_id,
        network.validators.leader().name,
        followers.join(", ")
    )
}

/// Load and validate the configuration only
pub fn run(config: &ConfigArgs) -> Result<()> {
    let network = config.load()?;
    println!("Configuration OK: {}", summary(&network));
    Ok(())
}
