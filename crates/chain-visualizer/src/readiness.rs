//! Waiting for the visualization server to come up
//!
//! Both loops check the probe first, give up once the elapsed time exceeds
//! `max_wait`, and otherwise sleep `poll_interval` before the next check.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{BridgeError, Result};

/// Default readiness budget in seconds
pub const DEFAULT_WAIT_SECS: u64 = 10;

/// Default delay between readiness checks in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// How long and how often to poll for readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitPolicy {
    pub fn new(max_wait: Duration, poll_interval: Duration) -> Self {
        Self {
            max_wait,
            poll_interval,
        }
    }
}

/// Block the calling thread until `is_running` reports true.
///
/// Returns the number of checks performed.
pub fn wait_until<P>(policy: &WaitPolicy, mut is_running: P) -> Result<u32>
where
    P: FnMut() -> bool,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        if is_running() {
            tracing::debug!(polls = polls, "Visualization server is running");
            return Ok(polls);
        }
        if started.elapsed() > policy.max_wait {
            tracing::warn!(
                polls = polls,
                max_wait_ms = policy.max_wait.as_millis() as u64,
                "Gave up waiting for visualization server"
            );
            return Err(BridgeError::timeout(policy.max_wait));
        }
        std::thread::sleep(policy.poll_interval);
    }
}

/// Async counterpart of [`wait_until`] for probes that do I/O.
pub async fn wait_until_async<F, Fut>(policy: &WaitPolicy, mut is_running: F) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        if is_running().await {
            tracing::debug!(polls = polls, "Visualization server is running");
            return Ok(polls);
        }
        if started.elapsed() > policy.max_wait {
            tracing::warn!(
                polls = polls,
                max_wait_ms = policy.max_wait.as_millis() as u64,
                "Gave up waiting for visualization server"
            );
            return Err(BridgeError::timeout(policy.max_wait));
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_policy() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(200), Duration::from_millis(20))
    }

    #[test]
    fn test_default_policy() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.max_wait, Duration::from_secs(10));
        assert_eq!(policy.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_ready_immediately() {
        let polls = wait_until(&short_policy(), || true).unwrap();
        assert_eq!(polls, 1);
    }

    #[test]
    fn test_ready_after_n_polls() {
        let mut calls = 0;
        let polls = wait_until(&short_policy(), || {
            calls += 1;
            calls >= 4
        })
        .unwrap();
        assert_eq!(polls, 4);
    }

    #[test]
    fn test_never_ready_times_out() {
        let policy = WaitPolicy::new(Duration::from_millis(200), Duration::from_millis(50));
        let started = Instant::now();

        let err = wait_until(&policy, || false).unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, BridgeError::Timeout { max_wait } if max_wait == policy.max_wait));
        assert!(elapsed >= policy.max_wait);
        assert!(elapsed < policy.max_wait + policy.poll_interval * 2);
    }

    #[tokio::test]
    async fn test_async_ready_after_n_polls() {
        let mut calls = 0;
        let polls = wait_until_async(&short_policy(), || {
            calls += 1;
            let ready = calls >= 3;
            async move { ready }
        })
        .await
        .unwrap();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn test_async_never_ready_times_out() {
        let policy = short_policy();
        let err = wait_until_async(&policy, || async { false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0.2 seconds"));
    }
}
