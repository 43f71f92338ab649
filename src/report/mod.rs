//! # Run Report
//!
//! Append-only record of every attempt in one run. Results are pushed under
//! a short-lived lock and then forwarded to the configured sinks with the
//! lock released, so a slow sink never blocks another step's append.
//!
//! Overall status, from each step's final result:
//! - `Aborted` if the run was cancelled, or the first step in execution order
//!   ended `FailedFatal`
//! - `AllSucceeded` if every step that was not skipped ended `Succeeded` and
//!   no step ended `FailedFatal`
//! - `PartialFailure` otherwise

pub mod sink;
pub mod store;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::{RunStatus, StepOutcome};
use crate::error::{Result, StagehandError};
use crate::logging::log_error;

pub use sink::{JsonLinesSink, MemorySink, ReportSink};
pub use store::ReportStore;

/// One attempt (or skip decision) for one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    /// 1-based; 0 for steps skipped without being attempted
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: StepOutcome,
    pub diagnostic: String,
}

impl StepResult {
    /// Result of an attempt that started at `started_at` and finished now
    pub fn attempt(
        step_id: impl Into<String>,
        attempt_number: u32,
        started_at: DateTime<Utc>,
        outcome: StepOutcome,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            attempt_number,
            started_at,
            finished_at: Utc::now(),
            outcome,
            diagnostic: diagnostic.into(),
        }
    }

    /// A step that was never attempted
    pub fn skipped(step_id: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id: step_id.into(),
            attempt_number: 0,
            started_at: now,
            finished_at: now,
            outcome: StepOutcome::Skipped,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Results recorded per outcome, one per attempt or skip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed_retryable: usize,
    pub failed_fatal: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn get(&self, outcome: StepOutcome) -> usize {
        match outcome {
            StepOutcome::Succeeded => self.succeeded,
            StepOutcome::FailedRetryable => self.failed_retryable,
            StepOutcome::FailedFatal => self.failed_fatal,
            StepOutcome::Skipped => self.skipped,
        }
    }

    fn add(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Succeeded => self.succeeded += 1,
            StepOutcome::FailedRetryable => self.failed_retryable += 1,
            StepOutcome::FailedFatal => self.failed_fatal += 1,
            StepOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Counts and timing derived from a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub status: Option<RunStatus>,
    pub outcome_counts: OutcomeCounts,
    pub steps_total: usize,
    pub attempts_total: usize,
    pub retries: usize,
    pub elapsed_ms: u64,
    pub failed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
}

impl ReportSummary {
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.outcome_counts.get(outcome)
    }

    /// Process exit code; a report that was never finalized counts as aborted
    pub fn exit_code(&self) -> i32 {
        self.status.unwrap_or(RunStatus::Aborted).exit_code()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Serializable form of a finalized report, persisted as `last-report.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<RunStatus>,
    pub cancelled: bool,
    pub execution_order: Vec<String>,
    pub results: Vec<StepResult>,
    /// Steps a resumed run may skip: succeeded here or satisfied by an earlier run
    #[serde(default)]
    pub satisfied_steps: Vec<String>,
    pub summary: ReportSummary,
}

impl ReportDocument {
    /// Last recorded result per step, in execution order
    pub fn final_results(&self) -> Vec<&StepResult> {
        final_results(&self.execution_order, &self.results)
    }

    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code()
    }
}

#[derive(Debug)]
struct ReportState {
    results: Vec<StepResult>,
    cancelled: bool,
    status: Option<RunStatus>,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ReportInner {
    run_id: Uuid,
    label: Option<String>,
    started_at: DateTime<Utc>,
    execution_order: Vec<String>,
    previously_satisfied: BTreeSet<String>,
    sinks: Vec<Arc<dyn ReportSink>>,
    state: Mutex<ReportState>,
}

/// Shared handle to the report of one run
///
/// Clones refer to the same report, so step tasks can append concurrently.
#[derive(Debug, Clone)]
pub struct RunReport {
    inner: Arc<ReportInner>,
}

/// Builder for a [`RunReport`]
#[derive(Debug, Default)]
pub struct RunReportBuilder {
    run_id: Option<Uuid>,
    label: Option<String>,
    execution_order: Vec<String>,
    previously_satisfied: BTreeSet<String>,
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl RunReportBuilder {
    pub fn run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn execution_order(mut self, order: Vec<String>) -> Self {
        self.execution_order = order;
        self
    }

    pub fn previously_satisfied<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.previously_satisfied.extend(ids);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> RunReport {
        RunReport {
            inner: Arc::new(ReportInner {
                run_id: self.run_id.unwrap_or_else(Uuid::new_v4),
                label: self.label,
                started_at: Utc::now(),
                execution_order: self.execution_order,
                previously_satisfied: self.previously_satisfied,
                sinks: self.sinks,
                state: Mutex::new(ReportState {
                    results: Vec::new(),
                    cancelled: false,
                    status: None,
                    finished_at: None,
                }),
            }),
        }
    }
}

impl RunReport {
    pub fn builder() -> RunReportBuilder {
        RunReportBuilder::default()
    }

    /// Report for steps that will run in `execution_order`
    pub fn new(execution_order: Vec<String>) -> Self {
        Self::builder().execution_order(execution_order).build()
    }

    pub fn run_id(&self) -> Uuid {
        self.inner.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn execution_order(&self) -> &[String] {
        &self.inner.execution_order
    }

    /// Append a result; fails with `ReportClosed` once finalized
    pub fn record(&self, result: StepResult) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.status.is_some() {
                return Err(StagehandError::ReportClosed);
            }
            state.results.push(result.clone());
        }

        for sink in &self.inner.sinks {
            if let Err(e) = sink.record(&result) {
                log_error(
                    "RunReport",
                    "sink_record",
                    &e.to_string(),
                    Some(&result.step_id),
                );
            }
        }
        Ok(())
    }

    /// Note that the run was cancelled before completion
    pub fn mark_cancelled(&self) {
        self.inner.state.lock().cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.state.lock().status.is_some()
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.inner.state.lock().status
    }

    /// Close the report and derive the overall status
    ///
    /// Calling it again returns the status computed the first time.
    pub fn finalize(&self) -> RunStatus {
        let status = {
            let mut state = self.inner.state.lock();
            if let Some(status) = state.status {
                return status;
            }
            let status = compute_status(
                &self.inner.execution_order,
                &state.results,
                state.cancelled,
            );
            state.status = Some(status);
            state.finished_at = Some(Utc::now());
            status
        };

        for sink in &self.inner.sinks {
            if let Err(e) = sink.flush() {
                log_error("RunReport", "sink_flush", &e.to_string(), None);
            }
        }
        status
    }

    /// Snapshot of all results in append order
    pub fn results(&self) -> Vec<StepResult> {
        self.inner.state.lock().results.clone()
    }

    /// Last recorded result per step, in execution order
    pub fn final_results(&self) -> Vec<StepResult> {
        let state = self.inner.state.lock();
        final_results(&self.inner.execution_order, &state.results)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> ReportSummary {
        let state = self.inner.state.lock();
        self.summary_locked(&state)
    }

    fn summary_locked(&self, state: &ReportState) -> ReportSummary {
        let mut outcome_counts = OutcomeCounts::default();
        for result in &state.results {
            outcome_counts.add(result.outcome);
        }

        let finals = final_results(&self.inner.execution_order, &state.results);
        let failed_steps = finals
            .iter()
            .filter(|r| r.outcome.is_failure())
            .map(|r| r.step_id.clone())
            .collect();
        let skipped_steps = finals
            .iter()
            .filter(|r| r.outcome == StepOutcome::Skipped)
            .map(|r| r.step_id.clone())
            .collect();

        let end = state.finished_at.unwrap_or_else(Utc::now);
        let elapsed_ms = (end - self.inner.started_at)
            .to_std()
            .unwrap_or_default()
            .as_millis() as u64;

        ReportSummary {
            run_id: self.inner.run_id,
            status: state.status,
            steps_total: self.inner.execution_order.len(),
            attempts_total: state
                .results
                .iter()
                .filter(|r| r.attempt_number > 0)
                .count(),
            retries: outcome_counts.failed_retryable,
            outcome_counts,
            elapsed_ms,
            failed_steps,
            skipped_steps,
        }
    }

    /// Serializable snapshot, suitable for persistence
    pub fn to_document(&self) -> ReportDocument {
        let state = self.inner.state.lock();

        let mut satisfied: BTreeSet<String> = final_results(&self.inner.execution_order, &state.results)
            .into_iter()
            .filter(|r| r.outcome.satisfies_dependents())
            .map(|r| r.step_id.clone())
            .collect();
        satisfied.extend(
            self.inner
                .previously_satisfied
                .iter()
                .filter(|id| self.inner.execution_order.contains(id))
                .cloned(),
        );

        ReportDocument {
            run_id: self.inner.run_id,
            label: self.inner.label.clone(),
            started_at: self.inner.started_at,
            finished_at: state.finished_at,
            status: state.status,
            cancelled: state.cancelled,
            execution_order: self.inner.execution_order.clone(),
            results: state.results.clone(),
            satisfied_steps: satisfied.into_iter().collect(),
            summary: self.summary_locked(&state),
        }
    }
}

fn final_results<'a>(execution_order: &[String], results: &'a [StepResult]) -> Vec<&'a StepResult> {
    let mut last: HashMap<&str, &StepResult> = HashMap::new();
    for result in results {
        last.insert(result.step_id.as_str(), result);
    }
    execution_order
        .iter()
        .filter_map(|id| last.get(id.as_str()).copied())
        .collect()
}

fn compute_status(execution_order: &[String], results: &[StepResult], cancelled: bool) -> RunStatus {
    if cancelled {
        return RunStatus::Aborted;
    }

    let finals = final_results(execution_order, results);
    let last_for = |id: &str| finals.iter().find(|r| r.step_id == id).copied();

    if let Some(first) = execution_order.first() {
        if last_for(first).is_some_and(|r| r.outcome == StepOutcome::FailedFatal) {
            return RunStatus::Aborted;
        }
    }

    let every_step_settled = execution_order.iter().all(|id| match last_for(id) {
        Some(result) => matches!(result.outcome, StepOutcome::Succeeded | StepOutcome::Skipped),
        None => false,
    });
    let any_fatal = finals.iter().any(|r| r.outcome == StepOutcome::FailedFatal);

    if every_step_settled && !any_fatal {
        RunStatus::AllSucceeded
    } else {
        RunStatus::PartialFailure
    }
}
