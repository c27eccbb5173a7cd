//! Property test strategies for bootstrap scenarios
//!
//! Delivery delays and start offsets are drawn from small ranges relative to
//! the default poll interval, so generated schedules reorder signals without
//! coming near the wait timeout.

use crate::store::DeliveryDelays;
use bootnet_core::{SignalKey, SignalKind};
use proptest::prelude::*;

pub use proptest;

const KINDS: [SignalKind; 7] = [
    SignalKind::Address,
    SignalKind::NodeId,
    SignalKind::Gentx,
    SignalKind::Genesis,
    SignalKind::GenesisAccountsReady,
    SignalKind::FinalGenesis,
    SignalKind::SetupComplete,
];

/// Delay of a single signal in milliseconds
pub fn arb_delay_ms() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0u64), 1u64..5_000]
}

/// Per-kind delivery delays with a random default
pub fn arb_delivery_delays() -> impl Strategy<Value = DeliveryDelays> {
    (arb_delay_ms(), prop::collection::vec(arb_delay_ms(), KINDS.len())).prop_map(
        |(default_ms, per_kind)| {
            KINDS
                .iter()
                .zip(per_kind)
                .fold(DeliveryDelays::uniform(default_ms), |delays, (kind, ms)| {
                    delays.with_kind(*kind, ms)
                })
        },
    )
}

/// Per-kind delays refined with an independent delay for every key in `keys`.
///
/// Keys of the same kind get unrelated delays, so one validator's signal can
/// overtake another's.
pub fn arb_per_key_delays(keys: Vec<SignalKey>) -> impl Strategy<Value = DeliveryDelays> {
    let count = keys.len();
    (
        arb_delivery_delays(),
        prop::collection::vec(arb_delay_ms(), count),
    )
        .prop_map(move |(delays, per_key)| {
            keys.iter()
                .cloned()
                .zip(per_key)
                .fold(delays, |delays, (key, ms)| delays.with_key(key, ms))
        })
}

/// Start offsets in milliseconds for `nodes` nodes
pub fn arb_start_offsets(nodes: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..10_000, nodes)
}

/// Validator count for a generated network
pub fn arb_network_size() -> impl Strategy<Value = usize> {
    1usize..=4
}
