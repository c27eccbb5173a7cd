//! Bootstrap state machine
//!
//! [`BootstrapMachine`] walks a [`BootstrapPlan`] one step at a time. It does
//! no I/O: the caller feeds it observed signals and step completions and
//! executes the [`Directive`]s it hands out, the same split the rendezvous
//! service uses between deciding and doing.

use crate::command::NodeCommand;
use crate::plan::{BootstrapPlan, Phase, Step};
use crate::state::{LocalChainState, NodeState};
use bootnet_core::{Role, SignalKey, ValidatorName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the caller should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Perform this step, then call [`BootstrapMachine::complete`]
    Execute(Step),
    /// Hand control to the node process; the machine is already `Running`
    Launch(NodeCommand),
    /// Waiting on these signals; observe them and poll again
    Blocked(Vec<SignalKey>),
    /// Nothing left to do
    Finished,
    /// The machine was aborted
    Aborted,
}

/// A recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State left
    pub from: NodeState,
    /// State entered
    pub to: NodeState,
}

/// Per-node protocol state machine
#[derive(Debug, Clone)]
pub struct BootstrapMachine {
    validator: ValidatorName,
    role: Role,
    local: LocalChainState,
    phases: Vec<Phase>,
    phase_index: usize,
    step_index: usize,
    state: NodeState,
    observed: BTreeSet<SignalKey>,
    transitions: Vec<Transition>,
}

impl BootstrapMachine {
    /// Machine for `plan`, starting from what the node found locally
    pub fn new(plan: &BootstrapPlan, local: LocalChainState) -> Self {
        Self {
            validator: plan.validator.clone(),
            role: plan.role,
            local,
            phases: plan.phases(local).cloned().collect(),
            phase_index: 0,
            step_index: 0,
            state: NodeState::Uninitialized,
            observed: BTreeSet::new(),
            transitions: Vec::new(),
        }
    }

    /// Validator this machine runs for
    pub fn validator(&self) -> &ValidatorName {
        &self.validator
    }

    /// Current state
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Local state the machine started from
    pub fn local(&self) -> LocalChainState {
        self.local
    }

    /// State changes so far, oldest first
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Whether the machine reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Record that `key` is present in the shared store.
    ///
    /// Signals are write-once, so an observation never needs retracting.
    pub fn observe(&mut self, key: SignalKey) {
        self.observed.insert(key);
    }

    /// Next directive.
    ///
    /// Satisfied waits are consumed here and completed phases advance the
    /// state, so the returned directive is always actionable.
    pub fn poll(&mut self) -> Directive {
        loop {
            if self.state == NodeState::Aborted {
                return Directive::Aborted;
            }
            if self.state.is_terminal() {
                return Directive::Finished;
            }
            let Some(phase) = self.phases.get(self.phase_index) else {
                return Directive::Finished;
            };

            let Some(step) = phase.steps.get(self.step_index) else {
                let next = phase.state;
                self.enter(next);
                self.phase_index += 1;
                self.step_index = 0;
                continue;
            };

            match step {
                Step::Await { keys } => {
                    let missing: Vec<SignalKey> = keys
                        .iter()
                        .filter(|key| !self.observed.contains(key))
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        return Directive::Blocked(missing);
                    }
                    self.step_index += 1;
                }
                Step::Run { command } if command.is_start() && self.is_last_step() => {
                    let command = command.clone();
                    let next = phase.state;
                    self.enter(next);
                    self.phase_index += 1;
                    self.step_index = 0;
                    return Directive::Launch(command);
                }
                step => return Directive::Execute(step.clone()),
            }
        }
    }

    /// Mark the step last handed out by [`poll`](Self::poll) as done
    pub fn complete(&mut self) {
        if !self.state.is_terminal() {
            self.step_index += 1;
        }
    }

    /// Enter `Aborted`; later polls return [`Directive::Aborted`]
    pub fn abort(&mut self) {
        if self.state != NodeState::Aborted {
            self.enter(NodeState::Aborted);
        }
    }

    fn is_last_step(&self) -> bool {
        self.phase_index + 1 == self.phases.len()
            && self
                .phases
                .get(self.phase_index)
                .is_some_and(|phase| self.step_index + 1 == phase.steps.len())
    }

    fn enter(&mut self, next: NodeState) {
        debug_assert!(
            next == NodeState::Aborted || self.state.successor(self.role, self.local) == Some(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::info!(
            validator = %self.validator,
            from = %self.state,
            to = %next,
            "bootstrap transition"
        );
        self.transitions.push(Transition {
            from: self.state,
            to: next,
        });
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use assert_matches::assert_matches;
    use bootnet_core::{
        BinaryConfig, DeploymentSettings, GlobalConfig, TokenAllocation, ValidatorConfig,
        ValidatorSet,
    };

    fn network() -> (ValidatorSet, GlobalConfig) {
        let validators = ["a", "b"]
            .iter()
            .enumerate()
            .map(|(i, n)| ValidatorConfig {
                name: ValidatorName::new_unchecked(*n),
                moniker: n.to_string(),
                key_name: format!("{n}key"),
                port: 26656 + i as u16 * 10,
                rpc_port: 26657 + i as u16 * 10,
                rest_port: 1317 + i as u16,
                grpc_port: 9090 + i as u16,
                tokens: TokenAllocation {
                    stake: "100stake".into(),
                    token: String::new(),
                    gentx_stake: "50stake".into(),
                },
            })
            .collect();
        let global = GlobalConfig {
            chain_id: "c".into(),
            keyring_backend: "test".into(),
            gas_price: "0stake".into(),
            data_dir: "/home".into(),
            binary: BinaryConfig {
                name: "node".into(),
                path: String::new(),
            },
        };
        (ValidatorSet::new(validators).unwrap(), global)
    }

    fn machine(name: &str, local: LocalChainState) -> BootstrapMachine {
        let (set, global) = network();
        let plan = BootstrapPlan::build(
            &set,
            &ValidatorName::new_unchecked(name),
            &global,
            &DeploymentSettings::default(),
        )
        .unwrap();
        BootstrapMachine::new(&plan, local)
    }

    /// Drives the machine, observing every awaited signal immediately
    fn drive(machine: &mut BootstrapMachine) -> Vec<Directive> {
        let mut seen = Vec::new();
        loop {
            let directive = machine.poll();
            seen.push(directive.clone());
            match directive {
                Directive::Execute(_) => machine.complete(),
                Directive::Blocked(keys) => keys.into_iter().for_each(|k| machine.observe(k)),
                Directive::Launch(_) => {}
                Directive::Finished | Directive::Aborted => return seen,
            }
        }
    }

    #[test]
    fn test_follower_reaches_running_through_every_state() {
        let mut machine = machine("b", LocalChainState::Fresh);
        let directives = drive(&mut machine);
        assert_eq!(machine.state(), NodeState::Running);
        let entered: Vec<_> = machine.transitions().iter().map(|t| t.to).collect();
        assert_eq!(
            entered,
            NodeState::path(Role::Follower, LocalChainState::Fresh)
        );
        assert_matches!(
            directives[directives.len() - 2],
            Directive::Launch(NodeCommand::Start { .. })
        );
    }

    #[test]
    fn test_blocked_until_observed() {
        let mut machine = machine("b", LocalChainState::Initialized);
        // warm restart: capture node id, publish it, then wait for the leader's
        assert_matches!(machine.poll(), Directive::Execute(Step::Capture { .. }));
        machine.complete();
        assert_matches!(machine.poll(), Directive::Execute(Step::PublishValue { .. }));
        machine.complete();
        let blocked = machine.poll();
        assert_eq!(
            blocked,
            Directive::Blocked(vec![SignalKey::NodeId(ValidatorName::new_unchecked("a"))])
        );
        // polling again without observing stays blocked
        assert_eq!(machine.poll(), blocked);
        machine.observe(SignalKey::NodeId(ValidatorName::new_unchecked("a")));
        assert_matches!(machine.poll(), Directive::Execute(Step::ConfigurePeers { .. }));
    }

    #[test]
    fn test_warm_restart_skips_cold_start_states() {
        let mut machine = machine("a", LocalChainState::Initialized);
        drive(&mut machine);
        let entered: Vec<_> = machine.transitions().iter().map(|t| t.to).collect();
        assert_eq!(entered, vec![NodeState::PeerDiscovery, NodeState::Running]);
    }

    #[test]
    fn test_abort_is_terminal() {
        let mut machine = machine("a", LocalChainState::Fresh);
        assert_matches!(machine.poll(), Directive::Execute(_));
        machine.abort();
        assert_eq!(machine.state(), NodeState::Aborted);
        assert_eq!(machine.poll(), Directive::Aborted);
        machine.complete();
        assert_eq!(machine.poll(), Directive::Aborted);
        assert!(machine.is_finished());
    }
}
