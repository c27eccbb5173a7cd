//! `bootnet generate`

use super::ConfigArgs;
use anyhow::Result;
use std::path::Path;

/// Validate, render and write the compose manifest
pub fn run(config: &ConfigArgs, output: &Path) -> Result<()> {
    let network = config.load()?;
    bootnet_render::generate(&network, output)?;
    println!(
        "Generated {} with {} validators (leader: {})",
        output.display(),
        network.validators.len(),
        network.validators.leader().name
    );
    Ok(())
}
