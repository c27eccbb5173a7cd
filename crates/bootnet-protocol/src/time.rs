//! Clocks and the wait policy shared by the driver and the rendered script

use async_trait::async_trait;
use bootnet_core::DeploymentSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source used for wait deadlines
#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since an arbitrary fixed origin
    fn now_ms(&self) -> u64;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Wall-clock implementation backed by `tokio::time`
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How long and how often a node polls for missing signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Fixed interval between polls; no backoff
    pub poll_interval: Duration,
    /// Give up after this long on one wait; `None` waits forever
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    /// Policy configured by deployment settings
    pub fn from_settings(settings: &DeploymentSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            timeout: settings.wait_timeout(),
        }
    }

    /// Same policy with a different timeout; `0` means unbounded
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        Self {
            timeout: (secs > 0).then(|| Duration::from_secs(secs)),
            ..self
        }
    }

    /// Timeout in whole seconds, `0` when unbounded
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.map_or(0, |t| t.as_secs().max(1))
    }

    /// Poll interval in whole seconds, at least one
    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval.as_secs().max(1)
    }

    /// Whether a wait that started at `started_ms` has expired at `now_ms`
    pub fn expired(&self, started_ms: u64, now_ms: u64) -> bool {
        self.timeout.is_some_and(|timeout| {
            u128::from(now_ms.saturating_sub(started_ms)) >= timeout.as_millis()
        })
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from_settings(&DeploymentSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_settings() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.timeout_secs(), 600);
        assert!(!policy.expired(0, 599_999));
        assert!(policy.expired(0, 600_000));
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let policy = WaitPolicy::default().with_timeout_secs(0);
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.timeout_secs(), 0);
        assert!(!policy.expired(0, u64::MAX));
    }

    #[tokio::test]
    async fn test_tokio_clock_advances() {
        let clock = TokioClock::new();
        let before = clock.now_ms();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now_ms() >= before + 5);
    }
}
