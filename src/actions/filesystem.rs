//! Filesystem actions. Both converge on the desired state, so applying them
//! twice leaves the same result as applying them once.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ActionContext, ActionOutcome, StepAction};

/// Create a directory and any missing parents
#[derive(Debug, Clone)]
pub struct EnsureDirectoryAction {
    path: PathBuf,
}

impl EnsureDirectoryAction {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StepAction for EnsureDirectoryAction {
    async fn execute(&self, _context: &ActionContext) -> ActionOutcome {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_dir() => return ActionOutcome::Completed,
            Ok(_) => {
                return ActionOutcome::Failed(format!(
                    "{} exists and is not a directory",
                    self.path.display()
                ))
            }
            Err(_) => {}
        }

        match tokio::fs::create_dir_all(&self.path).await {
            Ok(()) => ActionOutcome::Completed,
            Err(e) => ActionOutcome::Failed(format!("cannot create {}: {e}", self.path.display())),
        }
    }

    fn describe(&self) -> String {
        format!("ensure directory {}", self.path.display())
    }
}

/// Write a file, skipping the write when the contents already match
#[derive(Debug, Clone)]
pub struct WriteFileAction {
    path: PathBuf,
    contents: String,
    create_parents: bool,
}

impl WriteFileAction {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            create_parents: true,
        }
    }

    pub fn create_parents(mut self, create: bool) -> Self {
        self.create_parents = create;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StepAction for WriteFileAction {
    async fn execute(&self, context: &ActionContext) -> ActionOutcome {
        if let Ok(existing) = tokio::fs::read(&self.path).await {
            if existing == self.contents.as_bytes() {
                tracing::debug!(
                    step_id = %context.step_id,
                    path = %self.path.display(),
                    "File already up to date"
                );
                return ActionOutcome::Completed;
            }
        }

        if self.create_parents {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ActionOutcome::Failed(format!(
                        "cannot create {}: {e}",
                        parent.display()
                    ));
                }
            }
        }

        match tokio::fs::write(&self.path, self.contents.as_bytes()).await {
            Ok(()) => ActionOutcome::Completed,
            Err(e) => ActionOutcome::Failed(format!("cannot write {}: {e}", self.path.display())),
        }
    }

    fn describe(&self) -> String {
        format!("write file {}", self.path.display())
    }
}

/// Does nothing; useful as a grouping step other steps depend on
#[derive(Debug, Clone, Default)]
pub struct NoopAction;

#[async_trait]
impl StepAction for NoopAction {
    async fn execute(&self, _context: &ActionContext) -> ActionOutcome {
        ActionOutcome::Completed
    }

    fn describe(&self) -> String {
        "noop".to_string()
    }
}
