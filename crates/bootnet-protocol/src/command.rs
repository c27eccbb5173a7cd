//! Node binary CLI contract
//!
//! Every invocation of the node binary goes through [`NodeCommand::args`], so
//! the rendered script and the native driver pass identical arguments.

use bootnet_core::{ConfigValidator, FieldClass, Validate, ValidatorName};
use serde::{Deserialize, Serialize};

/// Which account an `add-genesis-account` call funds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRef {
    /// This node's own address, captured from `keys show`
    Own,
    /// A peer's address, read from its published `address` signal
    Published(ValidatorName),
}

/// One invocation of the node binary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum NodeCommand {
    /// `init <moniker> --chain-id <chain_id> --overwrite`
    Init {
        /// Node moniker
        moniker: String,
        /// Chain identifier
        chain_id: String,
    },
    /// `keys add <key_name> --keyring-backend <backend>`
    KeysAdd {
        /// Key alias
        key_name: String,
        /// Keyring backend
        keyring_backend: String,
    },
    /// `keys show <key_name> -a --keyring-backend <backend>`
    KeysShowAddress {
        /// Key alias
        key_name: String,
        /// Keyring backend
        keyring_backend: String,
    },
    /// `genesis add-genesis-account <address> <coins>`
    AddGenesisAccount {
        /// Account to fund
        account: AccountRef,
        /// Coins, `<stake>,<token>`
        coins: String,
    },
    /// `genesis gentx <key_name> <amount> --chain-id <chain_id> --keyring-backend <backend>`
    Gentx {
        /// Key alias
        key_name: String,
        /// Self-bond amount
        amount: String,
        /// Chain identifier
        chain_id: String,
        /// Keyring backend
        keyring_backend: String,
    },
    /// `genesis collect-gentxs`
    CollectGentxs,
    /// `tendermint show-node-id`
    ShowNodeId,
    /// `start --minimum-gas-prices=<price>`
    Start {
        /// Minimum gas price
        minimum_gas_prices: String,
    },
}

impl NodeCommand {
    /// Arguments after the binary name.
    ///
    /// `account` renders an [`AccountRef`]: a shell variable for the script,
    /// a concrete address for the native driver.
    pub fn args(&self, account: impl Fn(&AccountRef) -> String) -> Vec<String> {
        let owned = |parts: &[&str]| parts.iter().map(|p| (*p).to_string()).collect::<Vec<_>>();
        match self {
            Self::Init { moniker, chain_id } => {
                owned(&["init", moniker, "--chain-id", chain_id, "--overwrite"])
            }
            Self::KeysAdd {
                key_name,
                keyring_backend,
            } => owned(&["keys", "add", key_name, "--keyring-backend", keyring_backend]),
            Self::KeysShowAddress {
                key_name,
                keyring_backend,
            } => owned(&[
                "keys",
                "show",
                key_name,
                "-a",
                "--keyring-backend",
                keyring_backend,
            ]),
            Self::AddGenesisAccount { account: target, coins } => {
                let address = account(target);
                owned(&["genesis", "add-genesis-account", &address, coins])
            }
            Self::Gentx {
                key_name,
                amount,
                chain_id,
                keyring_backend,
            } => owned(&[
                "genesis",
                "gentx",
                key_name,
                amount,
                "--chain-id",
                chain_id,
                "--keyring-backend",
                keyring_backend,
            ]),
            Self::CollectGentxs => owned(&["genesis", "collect-gentxs"]),
            Self::ShowNodeId => owned(&["tendermint", "show-node-id"]),
            Self::Start { minimum_gas_prices } => {
                vec![
                    "start".to_string(),
                    format!("--minimum-gas-prices={minimum_gas_prices}"),
                ]
            }
        }
    }

    /// Whether the command hands control to the long-running node process
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start { .. })
    }
}

impl Validate for NodeCommand {
    fn validate_into(&self, validator: &mut ConfigValidator) {
        match self {
            Self::Init { moniker, chain_id } => {
                validator
                    .field("moniker", moniker, FieldClass::Value)
                    .field("chain_id", chain_id, FieldClass::Value);
            }
            Self::KeysAdd {
                key_name,
                keyring_backend,
            }
            | Self::KeysShowAddress {
                key_name,
                keyring_backend,
            } => {
                validator
                    .field("key_name", key_name, FieldClass::Value)
                    .field("keyring_backend", keyring_backend, FieldClass::Value);
            }
            Self::AddGenesisAccount { account, coins } => {
                if let AccountRef::Published(name) = account {
                    validator.field("account", name.as_str(), FieldClass::Identifier);
                }
                validator.field("coins", coins, FieldClass::Value);
            }
            Self::Gentx {
                key_name,
                amount,
                chain_id,
                keyring_backend,
            } => {
                validator
                    .field("key_name", key_name, FieldClass::Value)
                    .field("amount", amount, FieldClass::Value)
                    .field("chain_id", chain_id, FieldClass::Value)
                    .field("keyring_backend", keyring_backend, FieldClass::Value);
            }
            Self::CollectGentxs | Self::ShowNodeId => {}
            Self::Start { minimum_gas_prices } => {
                validator.field("minimum_gas_prices", minimum_gas_prices, FieldClass::Value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn no_account(_: &AccountRef) -> String {
        String::new()
    }

    #[test]
    fn test_cli_contract() {
        let init = NodeCommand::Init {
            moniker: "val1".into(),
            chain_id: "blog-testnet".into(),
        };
        assert_eq!(
            init.args(no_account),
            vec!["init", "val1", "--chain-id", "blog-testnet", "--overwrite"]
        );

        let show = NodeCommand::KeysShowAddress {
            key_name: "val1key".into(),
            keyring_backend: "test".into(),
        };
        assert_eq!(
            show.args(no_account),
            vec!["keys", "show", "val1key", "-a", "--keyring-backend", "test"]
        );

        let gentx = NodeCommand::Gentx {
            key_name: "val1key".into(),
            amount: "70000000stake".into(),
            chain_id: "blog-testnet".into(),
            keyring_backend: "test".into(),
        };
        assert_eq!(
            gentx.args(no_account).join(" "),
            "genesis gentx val1key 70000000stake --chain-id blog-testnet --keyring-backend test"
        );

        let start = NodeCommand::Start {
            minimum_gas_prices: "0.00001stake".into(),
        };
        assert_eq!(
            start.args(no_account),
            vec!["start", "--minimum-gas-prices=0.00001stake"]
        );
        assert!(start.is_start());
    }

    #[test]
    fn test_account_rendering_is_delegated() {
        let peer = ValidatorName::new_unchecked("val2");
        let add = NodeCommand::AddGenesisAccount {
            account: AccountRef::Published(peer),
            coins: "100stake,100token".into(),
        };
        let args = add.args(|account| match account {
            AccountRef::Own => "$ADDR".to_string(),
            AccountRef::Published(name) => format!("${{VAL_{}_ADDR}}", name.shell_ident()),
        });
        assert_eq!(
            args,
            vec![
                "genesis",
                "add-genesis-account",
                "${VAL_VAL2_ADDR}",
                "100stake,100token"
            ]
        );
    }

    #[test]
    fn test_unsafe_arguments_rejected() {
        let gentx = NodeCommand::Gentx {
            key_name: "val1key".into(),
            amount: "70000000stake".into(),
            chain_id: "x\"; rm -rf / #".into(),
            keyring_backend: "test".into(),
        };
        let err = gentx.validate().unwrap_err().to_string();
        assert!(err.contains("chain_id"), "{err}");

        let add = NodeCommand::AddGenesisAccount {
            account: AccountRef::Published(ValidatorName::new_unchecked("val$(id)")),
            coins: "100stake".into(),
        };
        assert!(add.validate().is_err());

        assert!(NodeCommand::CollectGentxs.validate().is_ok());
    }
}
