//! Step model: what to run, what it waits on, how it retries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::StepAction;
use crate::config::{BackoffKind, ExecutionConfig};
use crate::health::Probe;

/// How far a step's final failure reaches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureScope {
    /// Only transitive dependents are skipped; independent steps keep running
    #[default]
    Dependents,
    /// Dispatch stops and every step not yet started is skipped
    Run,
}

impl FailureScope {
    pub fn from_fatal_to_dependents(fatal_to_dependents: bool) -> Self {
        if fatal_to_dependents {
            Self::Dependents
        } else {
            Self::Run
        }
    }
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependents => write!(f, "dependents"),
            Self::Run => write!(f, "run"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub failure_scope: FailureScope,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            failure_scope: FailureScope::from_fatal_to_dependents(config.fatal_to_dependents),
        }
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffKind) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_failure_scope(mut self, failure_scope: FailureScope) -> Self {
        self.failure_scope = failure_scope;
        self
    }

    pub fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// A named unit of deployment work
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub description: Option<String>,
    /// Steps that must succeed first; duplicates are dropped at registration
    pub depends_on: Vec<String>,
    pub action: Arc<dyn StepAction>,
    pub probe: Option<Arc<dyn Probe>>,
    pub retry_policy: RetryPolicy,
    /// Overrides the run-wide per-step timeout
    pub timeout: Option<Duration>,
}

impl Step {
    pub fn new(id: impl Into<String>, action: Arc<dyn StepAction>) -> Self {
        Self {
            id: id.into(),
            description: None,
            depends_on: Vec::new(),
            action,
            probe: None,
            retry_policy: RetryPolicy::default(),
            timeout: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timeout for this step, falling back to the run-wide value
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}
