//! # Stagehand Configuration System
//!
//! YAML-based configuration with environment-aware overrides.
//!
//! ## Architecture
//!
//! - **Single file**: `stagehand-config.yaml` in the config directory
//! - **Environment sections**: a top-level `development`/`test`/`production`
//!   mapping is merged over the base for the active environment
//! - **Variable overrides**: `STAGEHAND_*` variables win over the file
//! - **Explicit validation**: invalid values fail loading instead of being clamped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stagehand_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let execution = &manager.config().execution;
//! println!("{} attempts, {:?} per step", execution.max_attempts, execution.timeout_per_step());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::health::NamedProbeDefinition;

/// Root configuration structure mirroring stagehand-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StagehandConfig {
    /// Step execution and retry settings
    pub execution: ExecutionConfig,

    /// Readiness polling and standalone health check settings
    pub health: HealthConfig,

    /// Run report persistence settings
    pub report: ReportConfig,
}

/// Retry backoff shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    #[default]
    Exponential,
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

impl std::str::FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            _ => Err(format!("Invalid backoff kind: {s} (expected fixed or exponential)")),
        }
    }
}

/// Step execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_multiplier: f64,
    pub timeout_per_step_seconds: u64,
    /// 1 runs steps sequentially in deterministic order
    pub concurrency: usize,
    pub fatal_to_dependents: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            retry_multiplier: 2.0,
            timeout_per_step_seconds: 60,
            concurrency: 1,
            fatal_to_dependents: true,
        }
    }
}

impl ExecutionConfig {
    /// Get per-step timeout as Duration
    pub fn timeout_per_step(&self) -> Duration {
        Duration::from_secs(self.timeout_per_step_seconds)
    }

    /// Get base retry delay as Duration
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Get retry delay cap as Duration
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

/// Readiness polling configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    /// 1.0 polls at a constant interval
    pub poll_multiplier: f64,
    pub probe_errors_retryable: bool,
    pub snapshot_timeout_seconds: u64,
    /// Probes checked by the standalone `healthcheck` command
    pub probes: Vec<NamedProbeDefinition>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_poll_interval_ms: 10_000,
            poll_multiplier: 1.5,
            probe_errors_retryable: false,
            snapshot_timeout_seconds: 10,
            probes: Vec::new(),
        }
    }
}

impl HealthConfig {
    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get poll interval cap as Duration
    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    /// Get aggregate snapshot timeout as Duration
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_seconds)
    }
}

/// Run report persistence configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub directory: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("log/runs"),
        }
    }
}

impl StagehandConfig {
    /// Validate configuration for consistency
    pub fn validate(&self) -> ConfigResult<()> {
        let execution = &self.execution;

        if execution.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }

        if execution.concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.concurrency",
                "0",
                "concurrency must be at least 1 (1 = sequential)",
            ));
        }

        if execution.timeout_per_step_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.timeout_per_step_seconds",
                "0",
                "step timeout must be greater than 0",
            ));
        }

        if execution.retry_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "execution.retry_multiplier",
                execution.retry_multiplier.to_string(),
                "multiplier below 1.0 would shrink retry delays",
            ));
        }

        if execution.retry_max_delay_ms < execution.retry_base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "execution.retry_max_delay_ms",
                execution.retry_max_delay_ms.to_string(),
                "cap must not be below retry_base_delay_ms",
            ));
        }

        let health = &self.health;

        if health.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "health.poll_interval_ms",
                "0",
                "poll interval must be greater than 0",
            ));
        }

        if health.poll_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "health.poll_multiplier",
                health.poll_multiplier.to_string(),
                "poll interval must be non-decreasing",
            ));
        }

        if health.max_poll_interval_ms < health.poll_interval_ms {
            return Err(ConfigurationError::invalid_value(
                "health.max_poll_interval_ms",
                health.max_poll_interval_ms.to_string(),
                "cap must not be below poll_interval_ms",
            ));
        }

        if health.snapshot_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "health.snapshot_timeout_seconds",
                "0",
                "snapshot timeout must be greater than 0",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for probe in &health.probes {
            if !seen.insert(probe.id.as_str()) {
                return Err(ConfigurationError::validation_error(format!(
                    "health probe id '{}' is defined more than once",
                    probe.id
                )));
            }
        }

        Ok(())
    }
}
