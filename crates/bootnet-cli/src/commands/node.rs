//! `bootnet node`
//!
//! Runs inside a validator container: the shared directory is the mounted
//! coordination volume and the node binary is invoked directly.

use super::ConfigArgs;
use anyhow::{Context, Result};
use bootnet_core::{NetworkConfig, Validate};
use bootnet_protocol::{
    BootstrapDriver, BootstrapPlan, FilesystemSignalStore, ProcessNodeHost, TokioClock,
};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the native bootstrap driver
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Validator this container runs
    #[arg(long)]
    pub validator: String,

    /// Shared coordination directory, overriding the settings
    #[arg(long)]
    pub shared_dir: Option<PathBuf>,

    /// Give up on a wait after this many seconds; 0 waits forever
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Build the plan for `args`, applying command-line overrides
pub fn plan(args: &NodeArgs, mut network: NetworkConfig) -> Result<BootstrapPlan> {
    if let Some(dir) = &args.shared_dir {
        network.settings.shared_dir = dir.to_string_lossy().into_owned();
        network.validate().context("invalid --shared-dir")?;
    }
    let mut plan = BootstrapPlan::for_validator(&network, &args.validator)?;
    if let Some(secs) = args.timeout_secs {
        plan.wait = plan.wait.with_timeout_secs(secs);
    }
    Ok(plan)
}

/// Run the protocol to completion and hand over to the node process
pub async fn run(args: &NodeArgs) -> Result<()> {
    let network = args.config.load()?;
    let plan = plan(args, network)?;

    let store = FilesystemSignalStore::new(&plan.shared_dir);
    let host = ProcessNodeHost::new(&plan.binary, plan.layout.clone());
    let driver = BootstrapDriver::new(store, host, TokioClock::new(), plan.wait);

    let report = driver
        .run(&plan)
        .await
        .with_context(|| format!("bootstrap of {} failed", plan.validator))?;
    info!(
        validator = %report.validator,
        role = %report.role,
        warm_restart = report.warm_restart,
        final_state = %report.final_state,
        published = report.published.len(),
        "node exited"
    );
    if tracing::enabled!(tracing::Level::DEBUG) {
        let json = serde_json::to_string(&report)?;
        tracing::debug!(report = %json, "bootstrap report");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use bootnet_core::{
        BinaryConfig, DeploymentSettings, GlobalConfig, TokenAllocation, ValidatorConfig,
        ValidatorName,
    };

    fn network() -> NetworkConfig {
        let validator = |name: &str, i: u16| ValidatorConfig {
            name: ValidatorName::new_unchecked(name),
            moniker: name.to_string(),
            key_name: format!("{name}key"),
            port: 26656 + i * 10,
            rpc_port: 26657 + i * 10,
            rest_port: 1317 + i,
            grpc_port: 9090 + i,
            tokens: TokenAllocation {
                stake: "100stake".to_string(),
                token: "100token".to_string(),
                gentx_stake: "100stake".to_string(),
            },
        };
        NetworkConfig::new(
            GlobalConfig {
                chain_id: "blog-testnet".to_string(),
                keyring_backend: "test".to_string(),
                gas_price: "0.00001stake".to_string(),
                data_dir: "/root/.blog".to_string(),
                binary: BinaryConfig {
                    name: "blogd".to_string(),
                    path: String::new(),
                },
            },
            vec![validator("val1", 0), validator("val2", 1)],
            DeploymentSettings::default(),
        )
        .unwrap()
    }

    fn args(validator: &str) -> NodeArgs {
        NodeArgs {
            config: ConfigArgs {
                config: PathBuf::from("config.json"),
                validators: PathBuf::from("validators.json"),
                settings: None,
            },
            validator: validator.to_string(),
            shared_dir: None,
            timeout_secs: None,
        }
    }

    #[test]
    fn test_overrides_apply_to_plan() {
        let mut args = args("val2");
        args.shared_dir = Some(PathBuf::from("/tmp/coord"));
        args.timeout_secs = Some(0);
        let plan = plan(&args, network()).unwrap();
        assert_eq!(plan.shared_dir, "/tmp/coord");
        assert_eq!(plan.wait.timeout, None);
    }

    #[test]
    fn test_relative_shared_dir_is_rejected() {
        let mut args = args("val1");
        args.shared_dir = Some(PathBuf::from("coord"));
        assert!(plan(&args, network()).is_err());
    }

    #[test]
    fn test_unknown_validator_is_rejected() {
        let err = plan(&args("val9"), network()).unwrap_err();
        assert!(format!("{err:#}").contains("not in the validator set"));
    }
}
