//! # bootnet-render
//!
//! Generation-time rendering: per-validator startup scripts
//! ([`ScriptAssembler`]) folded into one compose manifest
//! ([`ManifestComposer`]), written atomically.
//!
//! Generation is a pure function of the configuration and runs on a single
//! thread; output follows validator set order.

#![forbid(unsafe_code)]

pub mod manifest;
pub mod output;
pub mod script;

pub use manifest::{ComposeManifest, ManifestComposer, ServiceSpec};
pub use output::write_atomic;
pub use script::{render_script, ScriptAssembler};

use bootnet_core::{NetworkConfig, Result};
use std::path::Path;

/// Render the manifest for `network` as YAML
pub fn render_manifest(network: &NetworkConfig) -> Result<String> {
    ManifestComposer::new(network).compose()?.to_yaml()
}

/// Render the manifest and write it to `path`; nothing is written on error
pub fn generate(network: &NetworkConfig, path: &Path) -> Result<()> {
    let yaml = render_manifest(network)?;
    write_atomic(path, &yaml)?;
    tracing::info!(
        path = %path.display(),
        validators = network.validators.len(),
        "manifest generated"
    );
    Ok(())
}
