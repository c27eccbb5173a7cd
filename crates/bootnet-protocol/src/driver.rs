//! Native bootstrap driver
//!
//! [`BootstrapDriver`] interprets a [`BootstrapPlan`] against a signal store,
//! a node host and a clock. Waits poll at a fixed interval until the wait
//! policy's timeout; a stall or a failed step aborts the machine and the
//! error is returned without retry.

use crate::command::{AccountRef, NodeCommand};
use crate::host::NodeHost;
use crate::machine::{BootstrapMachine, Directive, Transition};
use crate::plan::{persistent_peers, BootstrapPlan, Captured, Step};
use crate::state::{LocalChainState, NodeState};
use crate::store::{Publication, SignalStore};
use crate::time::{Clock, WaitPolicy};
use bootnet_core::{BootstrapError, Result, Role, SignalKey, ValidatorName};
use serde::Serialize;
use std::collections::HashMap;

/// Summary of one node's bootstrap run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Validator that ran
    pub validator: ValidatorName,
    /// Its role
    pub role: Role,
    /// Whether local chain state was found and cold start skipped
    pub warm_restart: bool,
    /// State at the end of the run
    pub final_state: NodeState,
    /// Every state change, oldest first
    pub transitions: Vec<Transition>,
    /// Signals this node published, including idempotent re-publications
    pub published: Vec<SignalKey>,
    /// Peer string written to the network config
    pub persistent_peers: String,
    /// Virtual or wall time from start until launch
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct RunContext {
    captured: HashMap<Captured, String>,
    published: Vec<SignalKey>,
    persistent_peers: String,
    wait_started: Option<u64>,
}

/// Runs one node's protocol to completion
#[derive(Debug, Clone)]
pub struct BootstrapDriver<S, H, C> {
    store: S,
    host: H,
    clock: C,
    wait: WaitPolicy,
}

impl<S, H, C> BootstrapDriver<S, H, C>
where
    S: SignalStore,
    H: NodeHost,
    C: Clock,
{
    /// Driver over the given effects
    pub fn new(store: S, host: H, clock: C, wait: WaitPolicy) -> Self {
        Self {
            store,
            host,
            clock,
            wait,
        }
    }

    /// Signal store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Node host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run `plan` until the node is launched or the run aborts
    pub async fn run(&self, plan: &BootstrapPlan) -> Result<BootstrapReport> {
        let started = self.clock.now_ms();
        let local = self.host.local_state().await?;
        tracing::info!(
            validator = %plan.validator,
            role = %plan.role,
            warm_restart = local == LocalChainState::Initialized,
            "starting bootstrap"
        );

        let mut machine = BootstrapMachine::new(plan, local);
        let mut ctx = RunContext::default();

        loop {
            match machine.poll() {
                Directive::Execute(step) => {
                    ctx.wait_started = None;
                    if let Err(err) = self.execute(&step, &mut ctx).await {
                        return Err(self.abort(&mut machine, err));
                    }
                    machine.complete();
                }
                Directive::Blocked(missing) => {
                    if let Err(err) = self.wait_for(&mut machine, missing, &mut ctx).await {
                        return Err(self.abort(&mut machine, err));
                    }
                }
                Directive::Launch(command) => {
                    let report = self.report(plan, &machine, ctx, started);
                    tracing::info!(
                        validator = %report.validator,
                        peers = %report.persistent_peers,
                        elapsed_ms = report.elapsed_ms,
                        "bootstrap complete, launching node"
                    );
                    let args = command.args(|_| String::new());
                    if let Err(err) = self.host.launch(&command, &args).await {
                        return Err(self.abort(&mut machine, err));
                    }
                    return Ok(report);
                }
                Directive::Finished => return Ok(self.report(plan, &machine, ctx, started)),
                Directive::Aborted => {
                    return Err(BootstrapError::internal(format!(
                        "bootstrap of {} was aborted",
                        plan.validator
                    )))
                }
            }
        }
    }

    fn abort(&self, machine: &mut BootstrapMachine, err: BootstrapError) -> BootstrapError {
        tracing::warn!(
            validator = %machine.validator(),
            state = %machine.state(),
            error = %err,
            "bootstrap aborted"
        );
        machine.abort();
        err
    }

    fn report(
        &self,
        plan: &BootstrapPlan,
        machine: &BootstrapMachine,
        ctx: RunContext,
        started: u64,
    ) -> BootstrapReport {
        BootstrapReport {
            validator: plan.validator.clone(),
            role: plan.role,
            warm_restart: machine.local() == LocalChainState::Initialized,
            final_state: machine.state(),
            transitions: machine.transitions().to_vec(),
            published: ctx.published,
            persistent_peers: ctx.persistent_peers,
            elapsed_ms: self.clock.now_ms().saturating_sub(started),
        }
    }

    /// One poll round over the missing keys; sleeps if any stay missing
    async fn wait_for(
        &self,
        machine: &mut BootstrapMachine,
        missing: Vec<SignalKey>,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let mut still_missing = Vec::new();
        for key in missing {
            if self.store.contains(&key).await? {
                tracing::debug!(validator = %machine.validator(), signal = %key, "signal observed");
                machine.observe(key);
            } else {
                still_missing.push(key);
            }
        }
        if still_missing.is_empty() {
            return Ok(());
        }

        let now = self.clock.now_ms();
        let since = *ctx.wait_started.get_or_insert(now);
        if self.wait.expired(since, now) {
            return Err(BootstrapError::stall(
                machine.validator().as_str(),
                still_missing,
                now - since,
            ));
        }
        tracing::debug!(
            validator = %machine.validator(),
            missing = ?still_missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "waiting for signals"
        );
        self.clock.sleep(self.wait.poll_interval).await;
        Ok(())
    }

    async fn execute(&self, step: &Step, ctx: &mut RunContext) -> Result<()> {
        match step {
            Step::Run { command } => {
                let args = self.resolve_args(command, ctx).await?;
                self.host.run(command, &args).await?;
            }
            Step::Capture { output, command } => {
                let args = self.resolve_args(command, ctx).await?;
                let stdout = self.host.run(command, &args).await?;
                let value = stdout.trim();
                if value.is_empty() {
                    return Err(BootstrapError::command_failed(
                        args.join(" "),
                        "exit status: 0",
                        "command printed nothing",
                    ));
                }
                ctx.captured.insert(*output, value.to_string());
            }
            Step::PublishValue { key, value } => {
                let captured = ctx.captured.get(value).ok_or_else(|| {
                    BootstrapError::internal(format!("{value:?} published before it was captured"))
                })?;
                self.publish(key, format!("{captured}\n").as_bytes(), ctx)
                    .await?;
            }
            Step::PublishFile { key, file } => {
                let content = self.host.read_local(file).await?;
                self.publish(key, &content, ctx).await?;
            }
            Step::PublishMarker { key } => {
                self.publish(key, SignalKey::marker_content(), ctx).await?;
            }
            // Guards are resolved by the machine before a step is handed out.
            Step::Await { .. } => {}
            Step::Import { key, file } => {
                let content = self.fetch(key).await?;
                self.host.write_local(file, &content).await?;
            }
            Step::EnsureDir { dir } => self.host.ensure_dir(dir).await?,
            Step::ConfigurePeers { peers } => {
                let mut ids = HashMap::new();
                for peer in peers {
                    ids.insert(peer.name.clone(), self.fetch_text(&peer.node_id_signal()).await?);
                }
                let rendered = persistent_peers(peers, |peer| {
                    ids.get(&peer.name).cloned().unwrap_or_default()
                });
                self.host.set_persistent_peers(&rendered).await?;
                ctx.persistent_peers = rendered;
            }
            Step::SetMinimumGasPrices { price } => {
                self.host.set_minimum_gas_prices(price).await?;
            }
        }
        Ok(())
    }

    async fn resolve_args(&self, command: &NodeCommand, ctx: &RunContext) -> Result<Vec<String>> {
        let address = match command {
            NodeCommand::AddGenesisAccount { account, .. } => Some(match account {
                AccountRef::Own => ctx.captured.get(&Captured::Address).cloned().ok_or_else(
                    || BootstrapError::internal("own address used before it was captured"),
                )?,
                AccountRef::Published(name) => {
                    self.fetch_text(&SignalKey::Address(name.clone())).await?
                }
            }),
            _ => None,
        };
        Ok(command.args(|_| address.clone().unwrap_or_default()))
    }

    async fn publish(&self, key: &SignalKey, content: &[u8], ctx: &mut RunContext) -> Result<()> {
        let outcome = self.store.publish(key, content).await?;
        tracing::debug!(
            signal = %key,
            created = outcome == Publication::Created,
            "signal published"
        );
        ctx.published.push(key.clone());
        Ok(())
    }

    async fn fetch(&self, key: &SignalKey) -> Result<Vec<u8>> {
        self.store.fetch(key).await?.ok_or_else(|| {
            BootstrapError::internal(format!("signal {key} was observed but cannot be read"))
        })
    }

    async fn fetch_text(&self, key: &SignalKey) -> Result<String> {
        let bytes = self.fetch(key).await?;
        String::from_utf8(bytes)
            .map(|text| text.trim().to_string())
            .map_err(|_| BootstrapError::storage(format!("signal {key} is not valid UTF-8")))
    }
}
