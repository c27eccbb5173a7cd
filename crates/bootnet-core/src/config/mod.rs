//! Typed configuration model
//!
//! Global chain settings and per-validator settings, loaded from the
//! `config.json` / `validators.json` pair, plus deployment settings that are
//! not part of the chain itself.

mod settings;
mod validation;

pub use settings::{ContainerPorts, DeploymentSettings};
pub use validation::{ConfigValidator, FieldClass, Validate, ValidationIssue};

use crate::errors::{BootstrapError, Result};
use crate::validators::{ValidatorName, ValidatorSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Node binary identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinaryConfig {
    /// Executable name, resolved through `PATH`
    pub name: String,
    /// Directory holding the executable inside the image; prepended to `PATH`
    /// when non-empty
    #[serde(default)]
    pub path: String,
}

/// Global chain settings shared read-only by every validator render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Chain identifier passed to `init` and `gentx`
    pub chain_id: String,
    /// Keyring backend for every `keys` and `gentx` call
    pub keyring_backend: String,
    /// Minimum gas price written to `app.toml` and passed to `start`
    pub gas_price: String,
    /// Node home directory inside the container
    pub data_dir: String,
    /// Node binary identity
    pub binary: BinaryConfig,
}

/// Token allocation for one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenAllocation {
    /// Staking coins funded in genesis, e.g. `100000000stake`
    pub stake: String,
    /// Additional coins funded in genesis, e.g. `100000000token`; may be empty
    #[serde(default)]
    pub token: String,
    /// Amount self-bonded by the validator's gentx
    pub gentx_stake: String,
}

impl TokenAllocation {
    /// Coins argument for `add-genesis-account`: `<stake>,<token>`
    pub fn genesis_coins(&self) -> String {
        if self.token.is_empty() {
            self.stake.clone()
        } else {
            format!("{},{}", self.stake, self.token)
        }
    }
}

/// Per-validator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Unique name; service name, network host and signal namespace
    pub name: ValidatorName,
    /// Moniker passed to `init`
    pub moniker: String,
    /// Key alias in the keyring
    pub key_name: String,
    /// Host port published for P2P
    pub port: u16,
    /// Host port published for RPC
    pub rpc_port: u16,
    /// Host port published for REST
    pub rest_port: u16,
    /// Host port published for gRPC
    pub grpc_port: u16,
    /// Token allocation
    pub tokens: TokenAllocation,
}

impl ValidatorConfig {
    /// Host ports with their labels, in publication order
    pub fn host_ports(&self) -> [(&'static str, u16); 4] {
        [
            ("port", self.port),
            ("rpc_port", self.rpc_port),
            ("rest_port", self.rest_port),
            ("grpc_port", self.grpc_port),
        ]
    }
}

impl Validate for GlobalConfig {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        let mut global = validator.for_field("global");
        global
            .field("chain_id", &self.chain_id, FieldClass::Value)
            .field("keyring_backend", &self.keyring_backend, FieldClass::Value)
            .field("gas_price", &self.gas_price, FieldClass::Value)
            .field("data_dir", &self.data_dir, FieldClass::AbsolutePath)
            .field("binary.name", &self.binary.name, FieldClass::Value)
            .optional_field("binary.path", &self.binary.path, FieldClass::AbsolutePath);
        validator.merge(global);
    }
}

impl Validate for ValidatorConfig {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        validator
            .field("name", self.name.as_str(), FieldClass::Identifier)
            .field("moniker", &self.moniker, FieldClass::Value)
            .field("key_name", &self.key_name, FieldClass::Value)
            .field("tokens.stake", &self.tokens.stake, FieldClass::Value)
            .optional_field("tokens.token", &self.tokens.token, FieldClass::Value)
            .field("tokens.gentx_stake", &self.tokens.gentx_stake, FieldClass::Value);
        for (label, port) in self.host_ports() {
            validator.port(label, port);
        }
    }
}

impl Validate for [ValidatorConfig] {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        if self.is_empty() {
            validator.push("validators", "at least one validator is required");
            return;
        }

        validator.each("validators", self, |v, _, config| config.validate_into(v));

        let mut names: BTreeMap<&str, usize> = BTreeMap::new();
        let mut idents: BTreeMap<String, &str> = BTreeMap::new();
        let mut ports: BTreeMap<u16, String> = BTreeMap::new();
        for (index, config) in self.iter().enumerate() {
            let name = config.name.as_str();
            if let Some(first) = names.insert(name, index) {
                validator.push(
                    &format!("validators[{index}].name"),
                    format!("duplicate name '{name}' (first used by validators[{first}])"),
                );
                continue;
            }
            let ident = config.name.shell_ident();
            if let Some(other) = idents.insert(ident.clone(), name) {
                validator.push(
                    &format!("validators[{index}].name"),
                    format!("'{name}' and '{other}' both map to shell identifier {ident}"),
                );
            }
            for (label, port) in config.host_ports() {
                if port == 0 {
                    continue;
                }
                let field = format!("validators[{index}].{label}");
                if let Some(owner) = ports.insert(port, field.clone()) {
                    validator.push(&field, format!("port {port} already assigned to {owner}"));
                }
            }
        }
    }
}

/// Loaded and validated configuration for a whole network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Global chain settings
    pub global: GlobalConfig,
    /// Validated validator set
    pub validators: ValidatorSet,
    /// Deployment settings
    pub settings: DeploymentSettings,
}

impl NetworkConfig {
    /// Validate every part together so all issues are reported at once
    pub fn new(
        global: GlobalConfig,
        validators: Vec<ValidatorConfig>,
        settings: DeploymentSettings,
    ) -> Result<Self> {
        let mut validator = ConfigValidator::new();
        global.validate_into(&mut validator);
        settings.validate_into(&mut validator);
        validators.validate_into(&mut validator);
        validator.finish()?;

        let validators = ValidatorSet::new(validators)?;
        tracing::debug!(
            chain_id = %global.chain_id,
            validators = validators.len(),
            leader = %validators.leader().name,
            "network configuration validated"
        );
        Ok(Self {
            global,
            validators,
            settings,
        })
    }

    /// Load the global/validator JSON pair and optional settings TOML
    pub fn load(
        global_path: &Path,
        validators_path: &Path,
        settings_path: Option<&Path>,
    ) -> Result<Self> {
        let global = load_global_config(global_path)?;
        let validators = load_validator_configs(validators_path)?;
        let settings = match settings_path {
            Some(path) => DeploymentSettings::load(path)?,
            None => DeploymentSettings::default(),
        };
        Self::new(global, validators, settings)
    }
}

impl Validate for NetworkConfig {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        self.global.validate_into(validator);
        self.settings.validate_into(validator);
        self.validators.as_slice().validate_into(validator);
    }
}

/// Read and parse the global config file
pub fn load_global_config(path: &Path) -> Result<GlobalConfig> {
    let data = read_config_file(path, "global config")?;
    serde_json::from_str(&data).map_err(|e| {
        BootstrapError::config(format!(
            "error parsing global config file {}: {e}",
            path.display()
        ))
    })
}

/// Read and parse the validator list file
pub fn load_validator_configs(path: &Path) -> Result<Vec<ValidatorConfig>> {
    let data = read_config_file(path, "validator config")?;
    serde_json::from_str(&data).map_err(|e| {
        BootstrapError::config(format!(
            "error parsing validator config file {}: {e}",
            path.display()
        ))
    })
}

pub(crate) fn read_config_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        BootstrapError::config(format!("error reading {what} file {}: {e}", path.display()))
    })
}
