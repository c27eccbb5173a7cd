//! Simulated multi-node bootstrap
//!
//! Every node of a network runs its [`BootstrapDriver`] concurrently on one
//! task, sharing a [`DelayedSignalStore`] and a [`SimulatedClock`]. Node hosts
//! survive across runs, so a second run exercises warm restart.

use crate::host::FakeNodeHost;
use crate::store::{DeliveryDelays, DelayedSignalStore};
use crate::time::SimulatedClock;
use bootnet_core::{NetworkConfig, NodeLayout, Result, ValidatorName};
use bootnet_protocol::{BootstrapDriver, BootstrapPlan, BootstrapReport, Clock, WaitPolicy};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;

/// One network's nodes on a shared virtual timeline
#[derive(Debug, Clone)]
pub struct SimulatedCluster {
    plans: Vec<BootstrapPlan>,
    clock: SimulatedClock,
    store: DelayedSignalStore,
    hosts: Vec<FakeNodeHost>,
    start_offsets: HashMap<ValidatorName, Duration>,
    wait: WaitPolicy,
}

impl SimulatedCluster {
    /// Cluster for `network` with immediate signal delivery
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        Self::with_delays(network, DeliveryDelays::none())
    }

    /// Cluster for `network` with the given signal delivery delays
    pub fn with_delays(network: &NetworkConfig, delays: DeliveryDelays) -> Result<Self> {
        let plans = BootstrapPlan::for_network(network)?;
        let clock = SimulatedClock::new();
        let store = DelayedSignalStore::new(clock.clone(), delays);
        let hosts = plans
            .iter()
            .map(|plan| {
                FakeNodeHost::new(
                    plan.validator.clone(),
                    NodeLayout::new(network.global.data_dir.clone()),
                )
            })
            .collect();
        Ok(Self {
            plans,
            clock,
            store,
            hosts,
            start_offsets: HashMap::new(),
            wait: WaitPolicy::from_settings(&network.settings),
        })
    }

    /// Override the wait policy of every node
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Delay one node's start on the virtual clock
    pub fn with_start_offset(mut self, name: &str, offset: Duration) -> Self {
        self.start_offsets
            .insert(ValidatorName::new_unchecked(name), offset);
        self
    }

    /// Replace one node's host, e.g. with a failing one
    pub fn map_host(mut self, name: &str, map: impl FnOnce(FakeNodeHost) -> FakeNodeHost) -> Self {
        if let Some(index) = self.index_of(name) {
            let host = self.hosts.remove(index);
            self.hosts.insert(index, map(host));
        }
        self
    }

    /// Shared virtual clock
    pub fn clock(&self) -> &SimulatedClock {
        &self.clock
    }

    /// Shared signal store
    pub fn store(&self) -> &DelayedSignalStore {
        &self.store
    }

    /// Host of the named node
    pub fn host(&self, name: &str) -> Option<&FakeNodeHost> {
        self.index_of(name).map(|index| &self.hosts[index])
    }

    /// Every host, in set order
    pub fn hosts(&self) -> &[FakeNodeHost] {
        &self.hosts
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.plans
            .iter()
            .position(|plan| plan.validator.as_str() == name)
    }

    /// Run every node to completion; results are in set order
    pub async fn run_all(&self) -> Vec<Result<BootstrapReport>> {
        let names: Vec<&str> = self.plans.iter().map(|p| p.validator.as_str()).collect();
        self.run_only(&names).await
    }

    /// Run only the named nodes; results follow `names`
    pub async fn run_only(&self, names: &[&str]) -> Vec<Result<BootstrapReport>> {
        let runs = names.iter().filter_map(|name| {
            let index = self.index_of(name)?;
            let plan = &self.plans[index];
            let driver = BootstrapDriver::new(
                self.store.clone(),
                self.hosts[index].clone(),
                self.clock.clone(),
                self.wait,
            );
            let offset = self.start_offsets.get(&plan.validator).copied();
            let clock = self.clock.clone();
            let tick = self.wait.poll_interval;
            Some(async move {
                if let Some(offset) = offset {
                    let start = clock.now_ms() + offset.as_millis() as u64;
                    while clock.now_ms() < start {
                        clock.sleep(tick).await;
                    }
                }
                driver.run(plan).await
            })
        });
        let results = join_all(runs).await;
        tracing::debug!(nodes = results.len(), now_ms = self.clock.now_ms(), "cluster run finished");
        results
    }
}
