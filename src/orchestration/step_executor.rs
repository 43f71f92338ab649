//! # Step Executor
//!
//! Runs one step to a final outcome: invoke the action under the step
//! timeout, wait for the probe if there is one, and retry failed attempts
//! with backoff until the retry policy is exhausted. Every attempt is
//! recorded in the run report as it finishes.

use chrono::Utc;
use std::time::Duration;

use super::backoff::BackoffCalculator;
use super::cancellation::CancellationHandle;
use crate::actions::{ActionContext, ActionOutcome};
use crate::constants::{events, StepOutcome};
use crate::error::{Result, StagehandError};
use crate::health::HealthVerifier;
use crate::logging::log_step_operation;
use crate::registry::Step;
use crate::report::{RunReport, StepResult};

/// Why an attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptFailure {
    /// Counts against the retry policy
    Failed(String),
    /// The run was cancelled while waiting for readiness
    Cancelled(String),
}

#[derive(Debug, Clone, Default)]
pub struct StepExecutor {
    verifier: HealthVerifier,
    backoff: BackoffCalculator,
}

impl StepExecutor {
    pub fn new(verifier: HealthVerifier, backoff: BackoffCalculator) -> Self {
        Self { verifier, backoff }
    }

    pub fn verifier(&self) -> &HealthVerifier {
        &self.verifier
    }

    /// Run `step` until it succeeds, exhausts its attempts or is cancelled
    ///
    /// `default_timeout` applies when the step has no timeout of its own. It
    /// bounds the action call and, separately, the readiness wait.
    pub async fn execute(
        &self,
        step: &Step,
        report: &RunReport,
        cancellation: &CancellationHandle,
        default_timeout: Duration,
    ) -> Result<StepOutcome> {
        let timeout = step.effective_timeout(default_timeout);
        let policy = step.retry_policy;
        let mut attempt: u32 = 1;

        loop {
            let started_at = Utc::now();
            log_step_operation(
                events::STEP_DISPATCHED,
                &step.id,
                Some(attempt),
                "running",
                Some(&step.action.describe()),
            );

            let detail = match self.run_attempt(step, attempt, timeout, cancellation).await {
                Ok(detail) => {
                    log_step_operation(
                        events::STEP_SUCCEEDED,
                        &step.id,
                        Some(attempt),
                        "succeeded",
                        Some(&detail),
                    );
                    report.record(StepResult::attempt(
                        &step.id,
                        attempt,
                        started_at,
                        StepOutcome::Succeeded,
                        detail,
                    ))?;
                    return Ok(StepOutcome::Succeeded);
                }
                Err(AttemptFailure::Cancelled(detail)) => {
                    log_step_operation(
                        events::STEP_SKIPPED,
                        &step.id,
                        Some(attempt),
                        "cancelled",
                        Some(&detail),
                    );
                    report.record(StepResult::attempt(
                        &step.id,
                        attempt,
                        started_at,
                        StepOutcome::Skipped,
                        detail,
                    ))?;
                    return Ok(StepOutcome::Skipped);
                }
                Err(AttemptFailure::Failed(detail)) => detail,
            };

            if policy.is_final_attempt(attempt) {
                log_step_operation(
                    events::STEP_FAILED,
                    &step.id,
                    Some(attempt),
                    "failed_fatal",
                    Some(&detail),
                );
                report.record(StepResult::attempt(
                    &step.id,
                    attempt,
                    started_at,
                    StepOutcome::FailedFatal,
                    detail,
                ))?;
                return Ok(StepOutcome::FailedFatal);
            }

            let delay = self.backoff.delay_for(policy.backoff, attempt);
            log_step_operation(
                events::STEP_ATTEMPT_FAILED,
                &step.id,
                Some(attempt),
                "failed_retryable",
                Some(&format!("{detail}; retrying in {delay:?}")),
            );
            report.record(StepResult::attempt(
                &step.id,
                attempt,
                started_at,
                StepOutcome::FailedRetryable,
                detail,
            ))?;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation.cancelled() => {
                    let detail = format!("run cancelled before attempt {}", attempt + 1);
                    log_step_operation(events::STEP_SKIPPED, &step.id, None, "cancelled", Some(&detail));
                    report.record(StepResult::skipped(&step.id, detail))?;
                    return Ok(StepOutcome::Skipped);
                }
            }

            attempt += 1;
        }
    }

    async fn run_attempt(
        &self,
        step: &Step,
        attempt: u32,
        timeout: Duration,
        cancellation: &CancellationHandle,
    ) -> std::result::Result<String, AttemptFailure> {
        let context = ActionContext {
            step_id: step.id.clone(),
            attempt,
        };

        match tokio::time::timeout(timeout, step.action.execute(&context)).await {
            Ok(ActionOutcome::Completed) => {}
            Ok(ActionOutcome::Failed(detail)) => {
                let error = StagehandError::ActionFailed {
                    step_id: step.id.clone(),
                    detail,
                };
                return Err(AttemptFailure::Failed(error.to_string()));
            }
            Err(_) => {
                let error = StagehandError::ActionFailed {
                    step_id: step.id.clone(),
                    detail: format!("action did not finish within {timeout:?}"),
                };
                return Err(AttemptFailure::Failed(error.to_string()));
            }
        }

        let Some(probe) = &step.probe else {
            return Ok("action completed".to_string());
        };

        match self
            .verifier
            .wait_until_ready(probe.as_ref(), timeout, cancellation)
            .await
        {
            Ok(readiness) => Ok(format!(
                "ready after {} polls in {:?}",
                readiness.polls, readiness.waited
            )),
            Err(StagehandError::Cancelled(detail)) => Err(AttemptFailure::Cancelled(detail)),
            Err(error) => Err(AttemptFailure::Failed(error.to_string())),
        }
    }
}
