//! Compose manifest
//!
//! One service per validator, in set order. Every follower depends on the
//! leader; all services share the coordination volume. The startup script is
//! passed as `bash -c <script>` with `$` escaped for compose interpolation.

use crate::script::render_script;
use bootnet_core::{BootstrapError, NetworkConfig, Result, Validate, ValidatorConfig};
use bootnet_protocol::BootstrapPlan;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Top-level compose document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeManifest {
    /// Compose format version
    pub version: String,
    /// Services keyed by validator name, in set order
    pub services: IndexMap<String, ServiceSpec>,
    /// Networks; only the default network, renamed
    pub networks: IndexMap<String, NetworkSpec>,
    /// Named volumes
    pub volumes: IndexMap<String, VolumeSpec>,
}

/// One validator container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Image build context
    pub build: String,
    /// Container name
    pub container_name: String,
    /// `<host>:<container>` port mappings
    pub ports: Vec<String>,
    /// Private data directory and shared coordination volume
    pub volumes: Vec<String>,
    /// `KEY=value` entries
    pub environment: Vec<String>,
    /// Services started before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// `bash -c <script>`
    pub command: Vec<String>,
}

/// Network declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Actual network name
    pub name: String,
}

/// Named volume declaration; defaults only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {}

/// Escape `$` so compose passes it through verbatim
pub fn escape_interpolation(text: &str) -> String {
    text.replace('$', "$$")
}

/// Folds per-validator plans into a compose manifest
#[derive(Debug, Clone, Copy)]
pub struct ManifestComposer<'a> {
    network: &'a NetworkConfig,
}

impl<'a> ManifestComposer<'a> {
    /// Composer over a loaded network
    pub fn new(network: &'a NetworkConfig) -> Self {
        Self { network }
    }

    /// Build the manifest.
    ///
    /// The configuration is re-validated first, so no unsafe value ever
    /// reaches a rendered script.
    pub fn compose(&self) -> Result<ComposeManifest> {
        self.network.validate()?;
        let network = self.network;
        let settings = &network.settings;
        let leader = network.validators.leader().name.to_string();

        let mut services = IndexMap::new();
        for validator in &network.validators {
            let plan = BootstrapPlan::build(
                &network.validators,
                &validator.name,
                &network.global,
                settings,
            )?;
            let script = render_script(&plan)?;
            let depends_on = if plan.role.is_leader() {
                Vec::new()
            } else {
                vec![leader.clone()]
            };
            let service = ServiceSpec {
                build: settings.build_context.clone(),
                container_name: format!("{}-{}", settings.container_prefix, validator.name),
                ports: self.ports(validator),
                volumes: vec![
                    format!("./{}-data:{}", validator.name, network.global.data_dir),
                    format!("{}:{}", settings.shared_volume, settings.shared_dir),
                ],
                environment: vec![format!("MONIKER={}", validator.moniker)],
                depends_on,
                command: vec![
                    "bash".to_string(),
                    "-c".to_string(),
                    escape_interpolation(&script),
                ],
            };
            tracing::debug!(validator = %validator.name, role = %plan.role, "service composed");
            services.insert(validator.name.to_string(), service);
        }

        let mut networks = IndexMap::new();
        networks.insert(
            "default".to_string(),
            NetworkSpec {
                name: settings.network_name.clone(),
            },
        );
        let mut volumes = IndexMap::new();
        volumes.insert(settings.shared_volume.clone(), VolumeSpec::default());

        Ok(ComposeManifest {
            version: settings.compose_version.clone(),
            services,
            networks,
            volumes,
        })
    }

    fn ports(&self, validator: &ValidatorConfig) -> Vec<String> {
        let container = &self.network.settings.container_ports;
        [
            (validator.port, container.p2p),
            (validator.rpc_port, container.rpc),
            (validator.rest_port, container.rest),
            (validator.grpc_port, container.grpc),
        ]
        .iter()
        .map(|(host, inner)| format!("{host}:{inner}"))
        .collect()
    }
}

impl ComposeManifest {
    /// YAML text of the manifest
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| BootstrapError::render(format!("failed to serialize manifest: {e}")))
    }

    /// Parse a manifest back from YAML
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| BootstrapError::render(format!("failed to parse manifest: {e}")))
    }
}
