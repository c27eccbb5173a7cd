//! Deployment settings
//!
//! Everything the generated deployment needs that is not part of the chain
//! configuration. Defaults reproduce the historical testnet layout, so an
//! absent settings file yields the same manifest as before.

use super::{ConfigValidator, FieldClass, Validate};
use crate::errors::{BootstrapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ports the node listens on inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerPorts {
    /// P2P port; also the fixed port used in persistent peer entries
    pub p2p: u16,
    /// Tendermint RPC port
    pub rpc: u16,
    /// REST API port
    pub rest: u16,
    /// gRPC port
    pub grpc: u16,
}

impl Default for ContainerPorts {
    fn default() -> Self {
        Self {
            p2p: 26656,
            rpc: 26657,
            rest: 1317,
            grpc: 9090,
        }
    }
}

/// Deployment settings, optionally loaded from TOML
///
/// ```toml
/// network_name = "blog-network"
/// container_prefix = "blog"
/// shared_dir = "/shared"
/// bootstrap_timeout_secs = 600
///
/// [container_ports]
/// p2p = 26656
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentSettings {
    /// Compose file `version` field
    pub compose_version: String,
    /// Name of the compose network every node joins
    pub network_name: String,
    /// Container name prefix (`<prefix>-<validator>`)
    pub container_prefix: String,
    /// Image build context for every service
    pub build_context: String,
    /// Mount point of the shared coordination volume
    pub shared_dir: String,
    /// Name of the shared coordination volume
    pub shared_volume: String,
    /// Ports inside each container
    pub container_ports: ContainerPorts,
    /// Give up waiting for a signal after this many seconds; `0` waits forever
    pub bootstrap_timeout_secs: u64,
    /// Interval between signal polls
    pub poll_interval_secs: u64,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            compose_version: "3".to_string(),
            network_name: "blog-network".to_string(),
            container_prefix: "blog".to_string(),
            build_context: ".".to_string(),
            shared_dir: "/shared".to_string(),
            shared_volume: "shared".to_string(),
            container_ports: ContainerPorts::default(),
            bootstrap_timeout_secs: 600,
            poll_interval_secs: 1,
        }
    }
}

impl DeploymentSettings {
    /// Load settings from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let data = super::read_config_file(path, "settings")?;
        toml::from_str(&data).map_err(|e| {
            BootstrapError::config(format!(
                "error parsing settings file {}: {e}",
                path.display()
            ))
        })
    }

    /// Wait timeout, `None` when waits are unbounded
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.bootstrap_timeout_secs > 0).then(|| Duration::from_secs(self.bootstrap_timeout_secs))
    }

    /// Interval between signal polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Validate for DeploymentSettings {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        let mut settings = validator.for_field("settings");
        settings
            .field("compose_version", &self.compose_version, FieldClass::Value)
            .field("network_name", &self.network_name, FieldClass::Identifier)
            .field("container_prefix", &self.container_prefix, FieldClass::Identifier)
            .field("shared_dir", &self.shared_dir, FieldClass::AbsolutePath)
            .field("shared_volume", &self.shared_volume, FieldClass::Identifier)
            .custom(
                "build_context",
                &self.build_context,
                |context| {
                    context == "."
                        || FieldClass::Value.check(context).is_none()
                        || FieldClass::AbsolutePath.check(context).is_none()
                        || (context.starts_with("./")
                            && FieldClass::AbsolutePath.check(&context[1..]).is_none())
                },
                "must be '.', a relative path starting with './' or an absolute path",
            )
            .port("container_ports.p2p", self.container_ports.p2p)
            .port("container_ports.rpc", self.container_ports.rpc)
            .port("container_ports.rest", self.container_ports.rest)
            .port("container_ports.grpc", self.container_ports.grpc)
            .custom(
                "poll_interval_secs",
                &self.poll_interval_secs,
                |secs| *secs > 0,
                "must be at least 1",
            );
        validator.merge(settings);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults_match_historical_layout() {
        let settings = DeploymentSettings::default();
        assert_eq!(settings.container_ports.p2p, 26656);
        assert_eq!(settings.container_ports.rest, 1317);
        assert_eq!(settings.shared_dir, "/shared");
        assert_eq!(settings.network_name, "blog-network");
        assert_eq!(settings.wait_timeout(), Some(Duration::from_secs(600)));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootnet.toml");
        std::fs::write(
            &path,
            "network_name = \"lab\"\nbootstrap_timeout_secs = 0\n[container_ports]\ngrpc = 9191\n",
        )
        .unwrap();
        let settings = DeploymentSettings::load(&path).unwrap();
        assert_eq!(settings.network_name, "lab");
        assert_eq!(settings.container_ports.grpc, 9191);
        assert_eq!(settings.container_ports.p2p, 26656);
        assert_eq!(settings.wait_timeout(), None);
    }

    #[test]
    fn test_invalid_settings_reported() {
        let settings = DeploymentSettings {
            shared_dir: "shared".to_string(),
            poll_interval_secs: 0,
            ..DeploymentSettings::default()
        };
        let err = settings.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("settings.shared_dir: must be an absolute path"));
        assert!(message.contains("settings.poll_interval_secs: must be at least 1"));
    }
}
