//! Subprocess action.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{ActionContext, ActionOutcome, StepAction};
use crate::utils::text::{tail_excerpt, DEFAULT_EXCERPT_CHARS};

/// Runs a program and succeeds when it exits with status 0
///
/// The child is killed if the attempt times out. Idempotence is the
/// command's responsibility (`apt-get install -y`, `docker compose up -d`).
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandAction {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn in_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl StepAction for CommandAction {
    async fn execute(&self, context: &ActionContext) -> ActionOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .env("STAGEHAND_STEP_ID", &context.step_id)
            .env("STAGEHAND_ATTEMPT", context.attempt.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(
            step_id = %context.step_id,
            attempt = context.attempt,
            command = %self.command_line(),
            "Running step command"
        );

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => return ActionOutcome::Failed(format!("failed to start '{}': {e}", self.program)),
        };

        if output.status.success() {
            return ActionOutcome::Completed;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stderr.trim().is_empty() { stdout } else { stderr };
        ActionOutcome::Failed(format!(
            "'{}' exited with {}: {}",
            self.command_line(),
            output.status,
            tail_excerpt(&text, DEFAULT_EXCERPT_CHARS)
        ))
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command_line())
    }
}
