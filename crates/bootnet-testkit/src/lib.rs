//! # bootnet-testkit
//!
//! Deterministic simulation of a bootstrapping network:
//!
//! - [`time::SimulatedClock`]: one virtual timeline for every node
//! - [`store::DelayedSignalStore`]: a shared signal store with per-signal
//!   delivery delays
//! - [`host::FakeNodeHost`]: an in-memory node binary that enforces the
//!   ordering the real one depends on
//! - [`cluster::SimulatedCluster`]: every node of a network driven together
//! - [`fixtures`] and [`strategies`]: networks and proptest strategies
//!
//! ```rust,no_run
//! use bootnet_testkit::{fixtures, SimulatedCluster};
//!
//! # async fn example() -> bootnet_core::Result<()> {
//! let network = fixtures::network(3)?;
//! let cluster = SimulatedCluster::new(&network)?;
//! for report in cluster.run_all().await {
//!     assert!(report?.final_state.is_terminal());
//! }
//! # Ok(())
//! # }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod cluster;
pub mod fixtures;
pub mod host;
pub mod store;
pub mod strategies;
pub mod time;

pub use cluster::SimulatedCluster;
pub use host::{FakeAccount, FakeGenesis, FakeGentx, FakeNodeHost};
pub use store::{DeliveryDelays, DelayedSignalStore};
pub use time::SimulatedClock;
