//! # Step Actions
//!
//! The operation a step performs. Actions must be idempotent: the scheduler
//! may invoke one again after a failed attempt, and a resumed run may invoke
//! it again after a partial previous run. Built-in actions cover what the
//! chatbot provisioning scripts did by hand: run a command, call an HTTP
//! endpoint, create a directory, write a config file.

pub mod command;
pub mod definition;
pub mod filesystem;
pub mod http;

use async_trait::async_trait;
use std::fmt;

pub use command::CommandAction;
pub use definition::ActionDefinition;
pub use filesystem::{EnsureDirectoryAction, NoopAction, WriteFileAction};
pub use http::HttpAction;

/// What an action is told about the attempt it is running for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub step_id: String,
    /// 1-based attempt number
    pub attempt: u32,
}

/// Result of one action invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    Failed(String),
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(detail) => write!(f, "failed: {detail}"),
        }
    }
}

/// Idempotent operation run by a step
#[async_trait]
pub trait StepAction: Send + Sync + fmt::Debug {
    async fn execute(&self, context: &ActionContext) -> ActionOutcome;

    /// Short human description for logs and `--dry-run` style listings
    fn describe(&self) -> String {
        "custom action".to_string()
    }
}
