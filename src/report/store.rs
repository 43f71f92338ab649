//! Persisted reports: `last-report.json` for inspection and resume, plus the
//! `steps.jsonl` step log, both under the report directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ReportDocument, RunReport};
use crate::config::ReportConfig;
use crate::error::{Result, StagehandError};

pub const LAST_REPORT_FILE: &str = "last-report.json";
pub const STEP_LOG_FILE: &str = "steps.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStore {
    directory: PathBuf,
}

impl ReportStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.directory.clone())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn last_report_path(&self) -> PathBuf {
        self.directory.join(LAST_REPORT_FILE)
    }

    pub fn step_log_path(&self) -> PathBuf {
        self.directory.join(STEP_LOG_FILE)
    }

    /// Write the report as `last-report.json`, replacing the previous one
    ///
    /// The document goes to a temporary file first and is renamed into place,
    /// so an interrupted write never leaves a truncated report behind.
    pub fn persist(&self, report: &RunReport) -> Result<PathBuf> {
        self.persist_document(&report.to_document())
    }

    pub fn persist_document(&self, document: &ReportDocument) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory).map_err(|e| storage_error(&self.directory, e))?;

        let target = self.last_report_path();
        let temporary = self
            .directory
            .join(format!(".{LAST_REPORT_FILE}.{}.tmp", document.run_id));
        let encoded = serde_json::to_vec_pretty(document)?;

        fs::write(&temporary, encoded).map_err(|e| storage_error(&temporary, e))?;
        fs::rename(&temporary, &target).map_err(|e| storage_error(&target, e))?;

        tracing::info!(
            run_id = %document.run_id,
            path = %target.display(),
            "Run report persisted"
        );
        Ok(target)
    }

    /// The last persisted report, or `None` if no run has been persisted
    pub fn load_last(&self) -> Result<Option<ReportDocument>> {
        let path = self.last_report_path();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Read a report document from an explicit path
    pub fn load(path: &Path) -> Result<ReportDocument> {
        let content = fs::read(path).map_err(|e| storage_error(path, e))?;
        serde_json::from_slice(&content).map_err(|e| {
            StagehandError::ReportStorage(format!("{}: not a run report: {e}", path.display()))
        })
    }

    /// Step ids a resumed run may skip
    pub fn previously_satisfied(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_last()?
            .map(|document| document.satisfied_steps.into_iter().collect())
            .unwrap_or_default())
    }
}

fn storage_error(path: &Path, error: std::io::Error) -> StagehandError {
    StagehandError::ReportStorage(format!("{}: {error}", path.display()))
}
