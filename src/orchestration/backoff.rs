//! # Backoff Calculator
//!
//! Delay between failed attempts of a step. Fixed backoff always waits the
//! base delay; exponential backoff waits `base * multiplier^(attempt - 1)`,
//! capped at the configured maximum. No jitter: deployment runs are a single
//! caller, and deterministic delays keep paused-clock tests exact.

use std::time::Duration;

use crate::config::{BackoffKind, ExecutionConfig};

/// Configuration for backoff calculation behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffCalculator {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

impl BackoffCalculator {
    pub fn new(base_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            multiplier: multiplier.max(1.0),
        }
    }

    /// Create a BackoffCalculator from the execution section of the config
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            config.retry_base_delay(),
            config.retry_max_delay(),
            config.retry_multiplier,
        )
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, kind: BackoffKind, attempt: u32) -> Duration {
        match kind {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Exponential => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let seconds = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
                let capped = seconds.min(self.max_delay.as_secs_f64());
                Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
            }
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}
