//! Simulated clock

use async_trait::async_trait;
use bootnet_protocol::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Virtual clock shared by every simulated node.
///
/// `sleep` advances virtual time and yields to the runtime, so polling loops
/// make progress without waiting in real time. Clones share one timeline.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now_ms: Arc<AtomicU64>,
}

impl SimulatedClock {
    /// Clock at virtual time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `start_ms`
    pub fn starting_at(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance virtual time
    pub fn advance(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_advances_shared_timeline() {
        let clock = SimulatedClock::starting_at(100);
        let other = clock.clone();
        clock.sleep(Duration::from_secs(2)).await;
        assert_eq!(other.now_ms(), 2100);
    }
}
