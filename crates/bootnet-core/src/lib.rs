//! # bootnet-core
//!
//! Shared vocabulary for bootstrapping a multi-validator test network:
//!
//! - [`config`]: global chain settings, per-validator settings, deployment
//!   settings, loaders and validation
//! - [`validators`]: validator names, roles and the ordered [`ValidatorSet`]
//! - [`signal`]: write-once shared signal keys and their file names
//! - [`layout`]: files inside a node's home directory
//! - [`errors`]: the unified [`BootstrapError`]
//!
//! Nothing here performs I/O beyond reading configuration files.

#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod layout;
pub mod signal;
pub mod validators;

pub use config::{
    BinaryConfig, ConfigValidator, ContainerPorts, DeploymentSettings, FieldClass, GlobalConfig,
    NetworkConfig, TokenAllocation, Validate, ValidationIssue, ValidatorConfig,
};
pub use errors::{BootstrapError, Result};
pub use layout::{LocalFile, NodeLayout};
pub use signal::{SignalKey, SignalKind};
pub use validators::{Role, ValidatorName, ValidatorSet};
