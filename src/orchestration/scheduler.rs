//! # Dependency Scheduler
//!
//! Executes a validated registry. Steps are considered in execution order;
//! a step is dispatched only once every dependency has succeeded, and is
//! skipped as soon as one of them has not. With `concurrency == 1` exactly
//! one step runs at a time and results appear in execution order. Larger
//! values let independent steps overlap, bounded by the worker count.
//!
//! Cancellation stops dispatch. Steps already running finish their current
//! action; everything not started is recorded `Skipped`.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::backoff::BackoffCalculator;
use super::cancellation::CancellationHandle;
use super::step_executor::StepExecutor;
use crate::config::StagehandConfig;
use crate::constants::{events, StepOutcome};
use crate::error::Result;
use crate::health::{HealthVerifier, PollPolicy};
use crate::logging::{log_error, log_run_operation, log_step_operation};
use crate::registry::{FailureScope, ValidatedRegistry};
use crate::report::{ReportSink, RunReport, StepResult};

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Identifier for the run report, also stamped on sink output
    pub run_id: Uuid,
    /// Maximum steps in flight; 1 is sequential
    pub concurrency: usize,
    /// Timeout for steps that do not declare their own
    pub step_timeout: Duration,
    /// Steps that succeeded in an earlier run and are not run again
    pub previously_succeeded: HashSet<String>,
    pub cancellation: CancellationHandle,
    /// Free-form name stored in the report, usually the registry name
    pub label: Option<String>,
    pub sinks: Vec<Arc<dyn ReportSink>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&StagehandConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(config: &StagehandConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            concurrency: config.execution.concurrency.max(1),
            step_timeout: config.execution.timeout_per_step(),
            previously_succeeded: HashSet::new(),
            cancellation: CancellationHandle::new(),
            label: None,
            sinks: Vec::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn with_previously_succeeded<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.previously_succeeded.extend(ids);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationHandle) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Pending,
    Running,
    /// `true` when dependents may proceed
    Finished(bool),
}

type TaskOutput = (usize, std::thread::Result<Result<StepOutcome>>);

#[derive(Debug, Clone, Default)]
pub struct DependencyScheduler {
    executor: Arc<StepExecutor>,
}

impl DependencyScheduler {
    pub fn new(verifier: HealthVerifier, backoff: BackoffCalculator) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(verifier, backoff)),
        }
    }

    pub fn from_config(config: &StagehandConfig) -> Self {
        Self::new(
            HealthVerifier::new(PollPolicy::from_config(&config.health)),
            BackoffCalculator::from_config(&config.execution),
        )
    }

    /// Execute every step of `registry` and return the finalized report
    pub async fn run(&self, registry: &ValidatedRegistry, options: RunOptions) -> Result<RunReport> {
        let steps: Vec<_> = registry.ordered_steps().cloned().collect();
        let execution_order = registry.execution_order();
        let position: std::collections::HashMap<&str, usize> = execution_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let dependencies: Vec<Vec<usize>> = steps
            .iter()
            .map(|step| {
                registry
                    .dependencies_of(&step.id)
                    .into_iter()
                    .filter_map(|id| position.get(id).copied())
                    .collect()
            })
            .collect();

        let resumed: HashSet<&str> = execution_order
            .iter()
            .map(String::as_str)
            .filter(|id| options.previously_succeeded.contains(*id))
            .collect();

        let mut builder = RunReport::builder()
            .run_id(options.run_id)
            .execution_order(execution_order.clone())
            .previously_satisfied(resumed.iter().map(|id| id.to_string()));
        if let Some(label) = &options.label {
            builder = builder.label(label.clone());
        }
        for sink in &options.sinks {
            builder = builder.sink(Arc::clone(sink));
        }
        let report = builder.build();
        let run_id = report.run_id().to_string();

        let concurrency = options.concurrency.max(1);
        let cancellation = &options.cancellation;
        log_run_operation(
            events::RUN_STARTED,
            &run_id,
            "running",
            Some(&format!(
                "{} steps, concurrency {concurrency}, {} resumed",
                steps.len(),
                resumed.len()
            )),
        );

        let mut state = vec![StepState::Pending; steps.len()];
        let mut dispatched_at: Vec<Option<DateTime<Utc>>> = vec![None; steps.len()];
        let mut in_flight: JoinSet<TaskOutput> = JoinSet::new();
        let mut cancel_seen = false;
        let mut halted_by: Option<String> = None;

        loop {
            if !cancel_seen && cancellation.is_cancelled() {
                cancel_seen = true;
                report.mark_cancelled();
                log_run_operation(
                    events::RUN_CANCELLED,
                    &run_id,
                    "cancelling",
                    Some(&format!("{} steps in flight", in_flight.len())),
                );
            }

            if !cancel_seen && halted_by.is_none() {
                for index in 0..steps.len() {
                    if state[index] != StepState::Pending {
                        continue;
                    }
                    let step = &steps[index];

                    if resumed.contains(step.id.as_str()) {
                        let detail = "already succeeded in a previous run";
                        log_step_operation(events::STEP_SKIPPED, &step.id, None, "resumed", Some(detail));
                        report.record(StepResult::skipped(&step.id, detail))?;
                        state[index] = StepState::Finished(true);
                        continue;
                    }

                    if let Some(&failed) = dependencies[index]
                        .iter()
                        .find(|&&d| state[d] == StepState::Finished(false))
                    {
                        let detail = format!("dependency '{}' did not succeed", steps[failed].id);
                        log_step_operation(events::STEP_SKIPPED, &step.id, None, "skipped", Some(&detail));
                        report.record(StepResult::skipped(&step.id, detail))?;
                        state[index] = StepState::Finished(false);
                        continue;
                    }

                    let ready = dependencies[index]
                        .iter()
                        .all(|&d| state[d] == StepState::Finished(true));
                    if !ready {
                        if concurrency == 1 {
                            break;
                        }
                        continue;
                    }
                    if in_flight.len() >= concurrency {
                        break;
                    }

                    let executor = Arc::clone(&self.executor);
                    let task_step = Arc::clone(step);
                    let task_report = report.clone();
                    let task_cancellation = cancellation.clone();
                    let step_timeout = options.step_timeout;
                    in_flight.spawn(async move {
                        let outcome = AssertUnwindSafe(executor.execute(
                            &task_step,
                            &task_report,
                            &task_cancellation,
                            step_timeout,
                        ))
                        .catch_unwind()
                        .await;
                        (index, outcome)
                    });
                    state[index] = StepState::Running;
                    dispatched_at[index] = Some(Utc::now());
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = in_flight.join_next() => {
                    let (index, outcome) = match joined {
                        Ok(output) => output,
                        Err(e) => {
                            log_error("DependencyScheduler", "join_step_task", &e.to_string(), Some(&run_id));
                            continue;
                        }
                    };
                    let step = &steps[index];

                    let outcome = match outcome {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => {
                            log_error("DependencyScheduler", "execute_step", &e.to_string(), Some(&step.id));
                            StepOutcome::FailedFatal
                        }
                        Err(panic) => {
                            let detail = format!("step task panicked: {}", panic_message(panic.as_ref()));
                            log_error("DependencyScheduler", "execute_step", &detail, Some(&step.id));
                            let attempt = next_attempt_number(&report, &step.id);
                            report.record(StepResult::attempt(
                                &step.id,
                                attempt,
                                dispatched_at[index].unwrap_or_else(|| report.started_at()),
                                StepOutcome::FailedFatal,
                                detail,
                            ))?;
                            StepOutcome::FailedFatal
                        }
                    };

                    state[index] = StepState::Finished(outcome.satisfies_dependents());
                    if outcome == StepOutcome::FailedFatal
                        && step.retry_policy.failure_scope == FailureScope::Run
                        && halted_by.is_none()
                    {
                        log_run_operation(
                            events::RUN_CANCELLED,
                            &run_id,
                            "halting",
                            Some(&format!("step '{}' failed and is fatal to the run", step.id)),
                        );
                        halted_by = Some(step.id.clone());
                    }
                }
                _ = cancellation.cancelled(), if !cancel_seen => {}
                else => break,
            }
        }

        for (index, step) in steps.iter().enumerate() {
            match state[index] {
                StepState::Finished(_) => {}
                StepState::Running => {
                    let detail = "step task terminated unexpectedly";
                    report.record(StepResult::attempt(
                        &step.id,
                        next_attempt_number(&report, &step.id),
                        dispatched_at[index].unwrap_or_else(|| report.started_at()),
                        StepOutcome::FailedFatal,
                        detail,
                    ))?;
                }
                StepState::Pending => {
                    let detail = if cancel_seen {
                        "run cancelled before this step started".to_string()
                    } else if let Some(failed) = &halted_by {
                        format!("run halted after '{failed}' failed")
                    } else {
                        "step was never dispatched".to_string()
                    };
                    log_step_operation(events::STEP_SKIPPED, &step.id, None, "skipped", Some(&detail));
                    report.record(StepResult::skipped(&step.id, detail))?;
                }
            }
        }

        let status = report.finalize();
        let summary = report.summary();
        log_run_operation(
            events::RUN_FINISHED,
            &run_id,
            &status.to_string(),
            Some(&format!(
                "{} succeeded, {} failed, {} skipped, {} retries in {:?}",
                summary.count(StepOutcome::Succeeded),
                summary.failed_steps.len(),
                summary.skipped_steps.len(),
                summary.retries,
                summary.elapsed()
            )),
        );

        Ok(report)
    }
}

fn next_attempt_number(report: &RunReport, step_id: &str) -> u32 {
    report
        .results()
        .iter()
        .filter(|r| r.step_id == step_id)
        .map(|r| r.attempt_number)
        .max()
        .unwrap_or(0)
        + 1
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
