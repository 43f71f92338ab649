//! Report sinks receive each result as it is recorded.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::StepResult;
use crate::constants::StepOutcome;
use crate::error::{Result, StagehandError};

/// Destination for step results, called once per recorded result
pub trait ReportSink: Send + Sync + fmt::Debug {
    fn record(&self, result: &StepResult) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct StepLine<'a> {
    run_id: Uuid,
    step_id: &'a str,
    attempt: u32,
    outcome: StepOutcome,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    diagnostic: &'a str,
}

/// Appends one JSON object per result to a file
///
/// Lines from concurrent steps may interleave in time order but each line is
/// written whole.
#[derive(Debug)]
pub struct JsonLinesSink {
    run_id: Uuid,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating parent directories
    pub fn open(path: impl Into<PathBuf>, run_id: Uuid) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage_error(&path, e))?;

        Ok(Self {
            run_id,
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonLinesSink {
    fn record(&self, result: &StepResult) -> Result<()> {
        let line = StepLine {
            run_id: self.run_id,
            step_id: &result.step_id,
            attempt: result.attempt_number,
            outcome: result.outcome,
            started_at: result.started_at,
            finished_at: result.finished_at,
            diagnostic: &result.diagnostic,
        };
        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock();
        writer
            .write_all(&encoded)
            .and_then(|()| writer.flush())
            .map_err(|e| storage_error(&self.path, e))
    }

    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| storage_error(&self.path, e))
    }
}

/// Keeps results in memory; used by tests and embedding callers
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<StepResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<StepResult> {
        self.results.lock().clone()
    }
}

impl ReportSink for MemorySink {
    fn record(&self, result: &StepResult) -> Result<()> {
        self.results.lock().push(result.clone());
        Ok(())
    }
}

fn storage_error(path: &Path, error: std::io::Error) -> StagehandError {
    StagehandError::ReportStorage(format!("{}: {error}", path.display()))
}
