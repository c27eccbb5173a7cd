//! Line-level edits of node TOML configuration
//!
//! The node's config files carry comments and layout that a TOML round trip
//! would lose, so values are replaced in place, one line at a time.

use bootnet_core::{BootstrapError, Result};

/// Key holding the peer list in `config.toml`
pub const PERSISTENT_PEERS_KEY: &str = "persistent_peers";

/// Key holding the gas price floor in `app.toml`
pub const MINIMUM_GAS_PRICES_KEY: &str = "minimum-gas-prices";

/// Replace the value on every `key = ...` line with `"value"`.
///
/// Fails when no such line exists. Idempotent.
pub fn set_config_value(contents: &str, key: &str, value: &str) -> Result<String> {
    let mut found = false;
    let mut out = String::with_capacity(contents.len() + value.len());
    for line in contents.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let is_target = body
            .strip_prefix(key)
            .map(|rest| rest.trim_start().starts_with('='))
            .unwrap_or(false);
        if is_target {
            found = true;
            out.push_str(&format!("{key} = \"{value}\""));
            out.push_str(&line[body.len()..]);
        } else {
            out.push_str(line);
        }
    }
    if found {
        Ok(out)
    } else {
        Err(BootstrapError::storage(format!(
            "configuration has no '{key}' entry"
        )))
    }
}
