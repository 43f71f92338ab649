//! # System Constants
//!
//! Outcome and status enums shared by the scheduler, the health verifier and the
//! run report, plus the process exit codes derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured log event names
pub mod events {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_CANCELLED: &str = "run.cancelled";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const STEP_DISPATCHED: &str = "step.dispatched";
    pub const STEP_SUCCEEDED: &str = "step.succeeded";
    pub const STEP_ATTEMPT_FAILED: &str = "step.attempt_failed";
    pub const STEP_FAILED: &str = "step.failed";
    pub const STEP_SKIPPED: &str = "step.skipped";

    pub const PROBE_POLLED: &str = "probe.polled";
    pub const PROBE_READY: &str = "probe.ready";
    pub const PROBE_TIMEOUT: &str = "probe.timeout";
    pub const PROBE_ERROR: &str = "probe.error";
}

/// Process exit codes
///
/// Run and report commands use 0/1/2 by severity. Health checks use the
/// OK/WARNING/CRITICAL/UNKNOWN ladder common to monitoring plugins.
pub mod exit_codes {
    pub const ALL_SUCCEEDED: i32 = 0;
    pub const PARTIAL_FAILURE: i32 = 1;
    pub const ABORTED: i32 = 2;

    pub const HEALTHY: i32 = 0;
    pub const DEGRADED: i32 = 1;
    pub const UNHEALTHY: i32 = 2;
    pub const UNKNOWN: i32 = 3;

    /// No persisted report to show (sysexits EX_NOINPUT)
    pub const NO_REPORT: i32 = 66;

    /// Unexpected failure outside any step, e.g. report storage (EX_SOFTWARE)
    pub const INTERNAL_ERROR: i32 = 70;

    /// Bad configuration or registry definition (sysexits EX_CONFIG)
    pub const CONFIGURATION_ERROR: i32 = 78;
}

/// Outcome of a single step attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    FailedRetryable,
    FailedFatal,
    Skipped,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedRetryable | Self::FailedFatal)
    }

    /// Whether the step this outcome belongs to satisfies its dependents
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn all() -> [StepOutcome; 4] {
        [
            Self::Succeeded,
            Self::FailedRetryable,
            Self::FailedFatal,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::FailedRetryable => write!(f, "failed_retryable"),
            Self::FailedFatal => write!(f, "failed_fatal"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StepOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed_retryable" => Ok(Self::FailedRetryable),
            "failed_fatal" => Ok(Self::FailedFatal),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid step outcome: {s}")),
        }
    }
}

/// Overall status of a finalized run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AllSucceeded,
    PartialFailure,
    Aborted,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AllSucceeded => exit_codes::ALL_SUCCEEDED,
            Self::PartialFailure => exit_codes::PARTIAL_FAILURE,
            Self::Aborted => exit_codes::ABORTED,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::AllSucceeded)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllSucceeded => write!(f, "all_succeeded"),
            Self::PartialFailure => write!(f, "partial_failure"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Point-in-time health of a probed service
///
/// Variants are declared in increasing severity so `Ord` gives worst-of
/// aggregation, with `Unknown` ranked below `Unhealthy`: a probe that did not
/// answer is less conclusive than one that answered with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unknown,
    Unhealthy,
}

impl HealthStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Healthy => exit_codes::HEALTHY,
            Self::Degraded => exit_codes::DEGRADED,
            Self::Unhealthy => exit_codes::UNHEALTHY,
            Self::Unknown => exit_codes::UNKNOWN,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_problematic(&self) -> bool {
        !self.is_healthy()
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unknown => write!(f, "unknown"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}
