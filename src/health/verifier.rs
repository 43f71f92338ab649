//! # Health Verifier
//!
//! Polls a readiness probe until it reports ready, the overall timeout
//! elapses, or the run is cancelled. The poll interval starts at the
//! configured value and grows by the multiplier up to the cap; it never
//! shrinks.
//!
//! A `Timeout` is only returned once the deadline has passed: the last sleep
//! is shortened to end at the deadline and every probe call is bounded by the
//! time remaining, after which the probe gets one final poll.

use std::time::Duration;
use tokio::time::Instant;

use super::probe::{Probe, ProbeStatus};
use crate::config::HealthConfig;
use crate::constants::events;
use crate::error::{Result, StagehandError};
use crate::logging::log_probe_operation;
use crate::orchestration::cancellation::CancellationHandle;

/// Poll cadence and error handling for readiness waits
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    /// 1.0 keeps a constant interval
    pub multiplier: f64,
    /// Keep polling after `ProbeStatus::Error` instead of failing the wait
    pub errors_retryable: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&HealthConfig::default())
    }
}

impl PollPolicy {
    /// Constant interval, errors fail the wait
    pub fn constant(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            multiplier: 1.0,
            errors_retryable: false,
        }
    }

    pub fn from_config(config: &HealthConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_interval: config.max_poll_interval(),
            multiplier: config.poll_multiplier,
            errors_retryable: config.probe_errors_retryable,
        }
    }

    pub fn with_errors_retryable(mut self, retryable: bool) -> Self {
        self.errors_retryable = retryable;
        self
    }

    /// Interval following `current`: non-decreasing and capped
    pub fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_interval.max(self.interval);
        let grown = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(grown)
            .unwrap_or(cap)
            .max(current)
            .min(cap.max(current))
    }
}

/// Successful readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Number of probe calls, including the one that returned ready
    pub polls: u32,
    pub waited: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct HealthVerifier {
    policy: PollPolicy,
}

impl HealthVerifier {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll `probe` until it is ready or `timeout` has elapsed
    ///
    /// Returns `Timeout` carrying the last observed status, `ProbeError` on a
    /// probe error when errors are not retryable, and `Cancelled` when the
    /// handle fires between polls.
    pub async fn wait_until_ready(
        &self,
        probe: &dyn Probe,
        timeout: Duration,
        cancellation: &CancellationHandle,
    ) -> Result<Readiness> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut interval = self.policy.interval;
        let mut polls: u32 = 0;

        loop {
            if cancellation.is_cancelled() {
                return Err(cancelled(probe, polls));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            polls += 1;

            let status = match tokio::time::timeout(remaining, probe.check()).await {
                Ok(status) => status,
                Err(_) => {
                    return Err(timed_out(
                        probe,
                        timeout,
                        "probe call did not return before the deadline".to_string(),
                    ));
                }
            };

            log_probe_operation(
                events::PROBE_POLLED,
                probe.id(),
                &status.to_string(),
                Some(&format!("poll {polls}")),
            );

            let last_status = match status {
                ProbeStatus::Ready => {
                    let waited = started.elapsed();
                    log_probe_operation(
                        events::PROBE_READY,
                        probe.id(),
                        "ready",
                        Some(&format!("{polls} polls in {waited:?}")),
                    );
                    return Ok(Readiness { polls, waited });
                }
                ProbeStatus::Error(detail) if !self.policy.errors_retryable => {
                    log_probe_operation(events::PROBE_ERROR, probe.id(), "error", Some(&detail));
                    return Err(StagehandError::ProbeError {
                        probe_id: probe.id().to_string(),
                        detail,
                    });
                }
                other => other.to_string(),
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(probe, timeout, last_status));
            }

            let sleep_for = interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = cancellation.cancelled() => return Err(cancelled(probe, polls)),
            }
            interval = self.policy.next_interval(interval);
        }
    }
}

fn timed_out(probe: &dyn Probe, timeout: Duration, last_status: String) -> StagehandError {
    log_probe_operation(
        events::PROBE_TIMEOUT,
        probe.id(),
        "timeout",
        Some(&last_status),
    );
    StagehandError::Timeout {
        probe_id: probe.id().to_string(),
        timeout,
        last_status,
    }
}

fn cancelled(probe: &dyn Probe, polls: u32) -> StagehandError {
    StagehandError::Cancelled(format!(
        "readiness wait for '{}' cancelled after {polls} polls",
        probe.id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Default)]
    struct CountingProbe {
        calls: AtomicU32,
        ready_after: u32,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        fn id(&self) -> &str {
            "counting"
        }

        async fn check(&self) -> ProbeStatus {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call > self.ready_after {
                ProbeStatus::Ready
            } else {
                ProbeStatus::NotReady(format!("call {call}"))
            }
        }
    }

    #[test]
    fn test_interval_growth_is_monotonic_and_capped() {
        let policy = PollPolicy {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(300),
            multiplier: 2.0,
            errors_retryable: false,
        };
        let mut current = policy.interval;
        let mut seen = vec![current];
        for _ in 0..4 {
            current = policy.next_interval(current);
            seen.push(current);
        }
        let millis: Vec<u128> = seen.iter().map(Duration::as_millis).collect();
        assert_eq!(millis, vec![100, 200, 300, 300, 300]);
    }

    #[test]
    fn test_constant_policy_never_grows() {
        let policy = PollPolicy::constant(Duration::from_secs(2));
        assert_eq!(policy.next_interval(Duration::from_secs(2)), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_poll_does_not_sleep() {
        let probe = CountingProbe::default();
        let verifier = HealthVerifier::new(PollPolicy::constant(Duration::from_secs(1)));

        let readiness = verifier
            .wait_until_ready(&probe, Duration::from_secs(10), &CancellationHandle::new())
            .await
            .unwrap();

        assert_eq!(readiness.polls, 1);
        assert_eq!(readiness.waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_between_polls() {
        let probe = CountingProbe {
            calls: AtomicU32::new(0),
            ready_after: u32::MAX,
        };
        let verifier = HealthVerifier::new(PollPolicy::constant(Duration::from_secs(1)));
        let handle = CancellationHandle::new();

        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let err = verifier
            .wait_until_ready(&probe, Duration::from_secs(60), &handle)
            .await
            .unwrap_err();
        assert!(matches!(err, StagehandError::Cancelled(_)));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }
}
