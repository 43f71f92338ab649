//! Error types for the Stagehand orchestration core.
//!
//! Registration-time errors (`DuplicateStepId`, `CyclicDependency`,
//! `UnknownDependency`) abort startup before any step runs. Run-time errors
//! (`ActionFailed`, `ProbeError`, `Timeout`) are recoverable through a step's
//! retry policy and end up as recorded outcomes, never as a panic or an early
//! process exit.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StagehandError {
    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Cyclic dependency between steps: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Step '{step_id}' depends on unknown step '{missing_id}'")]
    UnknownDependency { step_id: String, missing_id: String },

    #[error("Action failed for step '{step_id}': {detail}")]
    ActionFailed { step_id: String, detail: String },

    #[error("Probe '{probe_id}' reported an error: {detail}")]
    ProbeError { probe_id: String, detail: String },

    #[error("Probe '{probe_id}' not ready after {timeout:?} (last status: {last_status})")]
    Timeout {
        probe_id: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("Run report is closed; no further results can be recorded")]
    ReportClosed,

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid registry definition: {0}")]
    InvalidDefinition(String),

    #[error("Report storage error: {0}")]
    ReportStorage(String),
}

impl StagehandError {
    /// Errors raised while building or validating a registry, before any step runs
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateStepId(_)
                | Self::CyclicDependency(_)
                | Self::UnknownDependency { .. }
                | Self::InvalidDefinition(_)
        )
    }

    /// Errors a retry policy is allowed to absorb
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ActionFailed { .. } | Self::ProbeError { .. } | Self::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for StagehandError {
    fn from(error: serde_json::Error) -> Self {
        StagehandError::ReportStorage(format!("JSON serialization error: {error}"))
    }
}

impl From<serde_yaml::Error> for StagehandError {
    fn from(error: serde_yaml::Error) -> Self {
        StagehandError::InvalidDefinition(format!("Invalid YAML: {error}"))
    }
}

impl From<ConfigurationError> for StagehandError {
    fn from(error: ConfigurationError) -> Self {
        StagehandError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StagehandError>;
