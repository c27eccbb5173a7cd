//! Bash rendering of a bootstrap plan
//!
//! The script is a straight-line transcription of the plan: cold-start phases
//! sit behind the local-state check, convergence phases always run, and every
//! wait is a bounded poll loop. Identical plans render byte-identical scripts.
//! Plans are validated again before rendering, since their fields are public.

use bootnet_core::{LocalFile, Result, SignalKey, Validate, ValidatorName};
use bootnet_protocol::{AccountRef, BootstrapPlan, Captured, NodeCommand, NodeState, Phase, Step};

/// Shell variable holding a captured value
fn captured_var(captured: Captured) -> &'static str {
    match captured {
        Captured::Address => "ADDR",
        Captured::NodeId => "NODE_ID",
    }
}

fn address_var(name: &ValidatorName) -> String {
    format!("VAL_{}_ADDR", name.shell_ident())
}

fn node_id_var(name: &ValidatorName) -> String {
    format!("NODE_{}_ID", name.shell_ident())
}

const HELPERS: &str = r#"publish() {
  local target="$SHARED_DIR/$1"
  local tmp="$SHARED_DIR/.$1.$$.tmp"
  cp "$2" "$tmp"
  if ln "$tmp" "$target" 2>/dev/null || cmp -s "$tmp" "$target"; then
    rm -f "$tmp"
  else
    rm -f "$tmp"
    echo "Signal conflict: $1 was already published with different content" >&2
    exit 1
  fi
}

publish_value() {
  local tmp
  tmp=$(mktemp)
  chmod 0644 "$tmp"
  printf '%s\n' "$2" > "$tmp"
  publish "$1" "$tmp"
  rm -f "$tmp"
}

bootstrap_tick() {
  if [[ "$BOOTSTRAP_TIMEOUT" -gt 0 && "$WAITED" -ge "$BOOTSTRAP_TIMEOUT" ]]; then
    echo "Coordination stall: $VALIDATOR waited ${WAITED}s for $1" >&2
    exit 1
  fi
  echo "Waiting for $1..."
  sleep "$POLL_INTERVAL"
  WAITED=$((WAITED + POLL_INTERVAL))
}

set_config() {
  if ! grep -q "^$2 *=" "$1"; then
    echo "Configuration $1 has no '$2' entry" >&2
    exit 1
  fi
  sed -i "s|^$2 *=.*|$2 = \"$3\"|" "$1"
}"#;

/// Renders one validator's startup script
#[derive(Debug, Clone, Copy)]
pub struct ScriptAssembler<'a> {
    plan: &'a BootstrapPlan,
}

impl<'a> ScriptAssembler<'a> {
    /// Assembler for `plan`
    pub fn new(plan: &'a BootstrapPlan) -> Self {
        Self { plan }
    }

    /// Complete script text, without a shebang line.
    ///
    /// Fails when any interpolated plan field breaks its character policy.
    pub fn render(&self) -> Result<String> {
        let plan = self.plan;
        plan.validate()?;
        let mut out = ScriptWriter::default();

        out.line(&format!(
            "# bootstrap {} ({})",
            plan.validator,
            if plan.role.is_leader() { "leader" } else { "follower" }
        ));
        out.line("set -euo pipefail");
        if !plan.binary.path.is_empty() {
            out.line(&format!("export PATH=\"{}:$PATH\"", plan.binary.path));
        }
        out.line(&format!("VALIDATOR={}", plan.validator));
        out.line(&format!("SHARED_DIR={}", plan.shared_dir.trim_end_matches('/')));
        out.line(&format!("BOOTSTRAP_TIMEOUT={}", plan.wait.timeout_secs()));
        out.line(&format!("POLL_INTERVAL={}", plan.wait.poll_interval_secs()));
        out.line("WAITED=0");
        out.blank();
        out.block(HELPERS);
        out.blank();

        let (cold, warm): (Vec<&Phase>, Vec<&Phase>) = plan
            .all_phases()
            .iter()
            .partition(|phase| phase.state.is_cold_start_only());

        let markers = bootnet_core::NodeLayout::initialized_markers()
            .iter()
            .map(|file| format!("[[ ! -f {} ]]", plan.layout.path(file)))
            .collect::<Vec<_>>()
            .join(" || ");
        out.line(&format!("if {markers}; then"));
        out.indent();
        out.line(&format!(
            "echo \"First time initialization for {}...\"",
            plan.validator
        ));
        for phase in cold {
            self.phase(&mut out, phase);
        }
        out.dedent();
        out.line("else");
        out.indent();
        out.line(&format!(
            "echo \"{} already initialized, rejoining the network...\"",
            plan.validator
        ));
        out.dedent();
        out.line("fi");

        for phase in warm {
            self.phase(&mut out, phase);
        }
        Ok(out.finish())
    }

    fn phase(&self, out: &mut ScriptWriter, phase: &Phase) {
        out.blank();
        out.line(&format!("# {}", phase.state));
        let last = phase.state == NodeState::Running;
        for step in &phase.steps {
            self.step(out, step, last);
        }
    }

    fn path(&self, file: &LocalFile) -> String {
        self.plan.layout.path(file)
    }

    fn shared(&self, key: &SignalKey) -> String {
        format!("$SHARED_DIR/{}", key.file_name())
    }

    fn invocation(&self, command: &NodeCommand) -> String {
        let args = command.args(|account| match account {
            AccountRef::Own => format!("\"${}\"", captured_var(Captured::Address)),
            AccountRef::Published(name) => format!("\"${}\"", address_var(name)),
        });
        format!("{} {}", self.plan.binary.name, args.join(" "))
    }

    fn step(&self, out: &mut ScriptWriter, step: &Step, launches: bool) {
        match step {
            Step::Run { command } => {
                if let NodeCommand::AddGenesisAccount {
                    account: AccountRef::Published(name),
                    ..
                } = command
                {
                    out.line(&format!(
                        "{}=$(cat {})",
                        address_var(name),
                        self.shared(&SignalKey::Address(name.clone()))
                    ));
                }
                let invocation = self.invocation(command);
                if launches && command.is_start() {
                    out.line(&format!("exec {invocation}"));
                } else {
                    out.line(&invocation);
                }
            }
            Step::Capture { output, command } => {
                out.line(&format!(
                    "{}=$({})",
                    captured_var(*output),
                    self.invocation(command)
                ));
            }
            Step::PublishValue { key, value } => {
                out.line(&format!(
                    "publish_value {} \"${}\"",
                    key.file_name(),
                    captured_var(*value)
                ));
            }
            Step::PublishFile { key, file } => match file {
                LocalFile::OwnGentx => {
                    out.line(&format!(
                        "OWN_GENTX=$(ls {}/*.json | head -n 1)",
                        self.path(&LocalFile::GentxDir)
                    ));
                    out.line(&format!("publish {} \"$OWN_GENTX\"", key.file_name()));
                }
                other => out.line(&format!("publish {} {}", key.file_name(), self.path(other))),
            },
            Step::PublishMarker { key } => {
                out.line(&format!("publish_value {} true", key.file_name()));
            }
            Step::Await { keys } => {
                let condition = keys
                    .iter()
                    .map(|key| format!("[[ ! -f {} ]]", self.shared(key)))
                    .collect::<Vec<_>>()
                    .join(" || ");
                let description = keys
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                out.line("WAITED=0");
                out.line(&format!("while {condition}; do"));
                out.indent();
                out.line(&format!("bootstrap_tick \"{description}\""));
                out.dedent();
                out.line("done");
            }
            Step::Import { key, file } => {
                out.line(&format!("cp {} {}", self.shared(key), self.path(file)));
            }
            Step::EnsureDir { dir } => out.line(&format!("mkdir -p {}", self.path(dir))),
            Step::ConfigurePeers { peers } => {
                for peer in peers {
                    out.line(&format!(
                        "{}=$(cat {})",
                        node_id_var(&peer.name),
                        self.shared(&peer.node_id_signal())
                    ));
                }
                let entries = bootnet_protocol::persistent_peers(peers, |peer| {
                    format!("${{{}}}", node_id_var(&peer.name))
                });
                out.line(&format!("PEERS=\"{entries}\""));
                out.line(&format!(
                    "set_config {} persistent_peers \"$PEERS\"",
                    self.path(&LocalFile::NetworkConfig)
                ));
            }
            Step::SetMinimumGasPrices { price } => {
                out.line(&format!(
                    "set_config {} minimum-gas-prices {price}",
                    self.path(&LocalFile::AppConfig)
                ));
            }
        }
    }
}

/// Render `plan` as a bash script
pub fn render_script(plan: &BootstrapPlan) -> Result<String> {
    ScriptAssembler::new(plan).render()
}

#[derive(Debug, Default)]
struct ScriptWriter {
    out: String,
    depth: usize,
}

impl ScriptWriter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.blank();
            } else {
                self.line(line);
            }
        }
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::test_support::{network, plan_for};

    #[test]
    fn test_rendering_is_deterministic() {
        let network = network(&[("a", "100"), ("b", "50")]);
        let first = render_script(&plan_for(&network, "a")).unwrap();
        let second = render_script(&plan_for(&network, "a")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cold_start_is_guarded_by_local_state() {
        let network = network(&[("a", "100"), ("b", "50")]);
        let script = render_script(&plan_for(&network, "b")).unwrap();
        assert!(script.contains(
            "if [[ ! -f /root/.blog/config/genesis.json ]] || [[ ! -f /root/.blog/config/priv_validator_key.json ]]; then"
        ));
        let guard = script.find("if [[ ! -f").unwrap();
        let fi = script.find("\nfi\n").unwrap();
        let init = script.find("blogd init b --chain-id blog-testnet --overwrite").unwrap();
        let node_id = script.find("NODE_ID=$(blogd tendermint show-node-id)").unwrap();
        assert!(guard < init && init < fi);
        assert!(fi < node_id);
    }

    #[test]
    fn test_leader_reads_published_addresses() {
        let network = network(&[("a", "100"), ("val-2", "50")]);
        let script = render_script(&plan_for(&network, "a")).unwrap();
        assert!(script.contains("VAL_VAL_2_ADDR=$(cat $SHARED_DIR/val-2_address)"));
        assert!(script.contains("blogd genesis add-genesis-account \"$VAL_VAL_2_ADDR\" 50stake,50token"));
        assert!(script.contains("mkdir -p /root/.blog/config/gentx"));
        assert!(script.contains("cp $SHARED_DIR/val-2_gentx.json /root/.blog/config/gentx/val-2_gentx.json"));
    }

    #[test]
    fn test_waits_are_bounded_by_timeout() {
        let network = network(&[("a", "100"), ("b", "50")]);
        let script = render_script(&plan_for(&network, "b")).unwrap();
        assert!(script.contains("BOOTSTRAP_TIMEOUT=600\n"));
        assert!(script.contains("while [[ ! -f $SHARED_DIR/genesis_accounts_ready ]]; do"));
        assert!(script.contains("bootstrap_tick \"genesis_accounts_ready\""));
    }

    #[test]
    fn test_launch_replaces_shell() {
        let network = network(&[("a", "100")]);
        let script = render_script(&plan_for(&network, "a")).unwrap();
        assert!(script.trim_end().ends_with("exec blogd start --minimum-gas-prices=0.00001stake"));
        assert!(script.contains("PEERS=\"\""));
    }

    #[test]
    fn test_binary_path_is_exported() {
        let mut network = network(&[("a", "100")]);
        network.global.binary.path = "/opt/blog/bin".to_string();
        let script = render_script(&plan_for(&network, "a")).unwrap();
        assert!(script.contains("export PATH=\"/opt/blog/bin:$PATH\""));
    }

    #[test]
    fn test_published_values_are_world_readable() {
        assert!(HELPERS.contains("tmp=$(mktemp)\n  chmod 0644 \"$tmp\"\n"));
    }

    #[test]
    fn test_mutated_plan_is_not_rendered() {
        let network = network(&[("a", "100"), ("b", "50")]);

        let mut plan = plan_for(&network, "b");
        plan.shared_dir = "/shared; rm -rf /".to_string();
        let err = render_script(&plan).unwrap_err();
        assert!(err.to_string().contains("plan.shared_dir"), "{err}");

        let mut plan = plan_for(&network, "b");
        plan.binary.name = "blogd\"; rm -rf / #".to_string();
        assert!(render_script(&plan).is_err());

        let mut plan = plan_for(&network, "b");
        plan.binary.path = "relative/bin".to_string();
        assert!(render_script(&plan).is_err());

        let plan = plan_for(&network, "b");
        assert!(!render_script(&plan).unwrap().contains("rm -rf"));
    }
}
