//! # bootnet-protocol
//!
//! The bootstrap coordination protocol as an explicit state machine.
//!
//! - [`plan`]: per-validator [`BootstrapPlan`] of phases and steps
//! - [`machine`]: the pure [`BootstrapMachine`] walking a plan
//! - [`store`]: write-once [`SignalStore`]s, in memory and on disk
//! - [`host`]: local node effects behind [`NodeHost`]
//! - [`driver`]: [`BootstrapDriver`], the native interpreter of a plan
//!
//! The rendered startup script (see `bootnet-render`) is the second
//! interpreter of the same plan.

#![forbid(unsafe_code)]

pub mod command;
pub mod driver;
pub mod host;
pub mod machine;
pub mod plan;
pub mod state;
pub mod store;
pub mod time;

pub use command::{AccountRef, NodeCommand};
pub use driver::{BootstrapDriver, BootstrapReport};
pub use host::{NodeHost, ProcessNodeHost};
pub use machine::{BootstrapMachine, Directive, Transition};
pub use plan::{persistent_peers, BootstrapPlan, Captured, PeerEntry, Phase, Step};
pub use state::{LocalChainState, NodeState};
pub use store::{FilesystemSignalStore, MemorySignalStore, Publication, SignalStore};
pub use time::{Clock, TokioClock, WaitPolicy};
