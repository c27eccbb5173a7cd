//! Testnet bootstrap CLI
//!
//! Generates the compose manifest for a multi-validator test network and
//! runs the bootstrap protocol natively inside a node container.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    check, generate,
    node::{self, NodeArgs},
    script::{self, ScriptArgs},
    ConfigArgs,
};

#[derive(Parser)]
#[command(name = "bootnet")]
#[command(about = "Bootstrap multi-validator test networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and write the compose manifest
    Generate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Manifest path
        #[arg(short, long, default_value = "docker-compose.yml")]
        output: std::path::PathBuf,
    },

    /// Validate the configuration without writing anything
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print one validator's startup script
    Script(ScriptArgs),

    /// Run the bootstrap protocol for one validator, then start its node
    Node(NodeArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.command).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate { config, output } => generate::run(&config, &output),
        Commands::Check { config } => check::run(&config),
        Commands::Script(args) => script::run(&args),
        Commands::Node(args) => node::run(&args).await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["bootnet", "generate"]).unwrap();
        match cli.command {
            Commands::Generate { config, output } => {
                assert_eq!(config.config.to_str(), Some("config.json"));
                assert_eq!(config.validators.to_str(), Some("validators.json"));
                assert!(config.settings.is_none());
                assert_eq!(output.to_str(), Some("docker-compose.yml"));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_node_requires_validator() {
        assert!(Cli::try_parse_from(["bootnet", "node"]).is_err());
        let cli = Cli::try_parse_from([
            "bootnet",
            "-v",
            "node",
            "--validator",
            "val2",
            "--timeout-secs",
            "0",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Node(args) => {
                assert_eq!(args.validator, "val2");
                assert_eq!(args.timeout_secs, Some(0));
                assert!(args.shared_dir.is_none());
            }
            _ => panic!("expected node"),
        }
    }
}
