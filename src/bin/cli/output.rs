//! Human-readable rendering of plans, reports and health snapshots

use stagehand_core::constants::{HealthStatus, RunStatus, StepOutcome};
use stagehand_core::health::HealthReport;
use stagehand_core::registry::ValidatedRegistry;
use stagehand_core::report::ReportDocument;

fn outcome_icon(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Succeeded => "✓",
        StepOutcome::FailedRetryable => "↻",
        StepOutcome::FailedFatal => "✗",
        StepOutcome::Skipped => "-",
    }
}

fn health_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✓",
        HealthStatus::Degraded => "!",
        HealthStatus::Unknown => "?",
        HealthStatus::Unhealthy => "✗",
    }
}

pub fn print_plan(name: &str, environment: &str, registry: &ValidatedRegistry) {
    println!("Execution plan for '{name}' (environment {environment}):");
    for (position, step) in registry.ordered_steps().enumerate() {
        let dependencies = registry.dependencies_of(&step.id);
        let after = if dependencies.is_empty() {
            String::new()
        } else {
            format!(" after {}", dependencies.join(", "))
        };
        println!(
            "  {:>2}. {}{after}: {} (max {} attempts, {} backoff)",
            position + 1,
            step.id,
            step.action.describe(),
            step.retry_policy.max_attempts,
            step.retry_policy.backoff
        );
        if let Some(probe) = &step.probe {
            println!("      readiness probe: {}", probe.id());
        }
    }
}

pub fn print_run_summary(document: &ReportDocument) {
    let summary = &document.summary;
    let status = document
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "not finalized".to_string());
    let icon = match document.status {
        Some(RunStatus::AllSucceeded) => "✓",
        _ => "✗",
    };

    println!();
    println!(
        "{icon} Run {} {}: {status}",
        document.label.as_deref().unwrap_or("(unnamed)"),
        document.run_id
    );
    println!(
        "  {} steps | {} succeeded | {} failed | {} skipped | {} retries | {:.1}s",
        summary.steps_total,
        summary.count(StepOutcome::Succeeded),
        summary.failed_steps.len(),
        summary.skipped_steps.len(),
        summary.retries,
        summary.elapsed().as_secs_f64()
    );
}

pub fn print_results(document: &ReportDocument) {
    println!("  Attempts:");
    for result in &document.results {
        let attempt = if result.attempt_number == 0 {
            "-".to_string()
        } else {
            result.attempt_number.to_string()
        };
        println!(
            "    {} {} [{attempt}] {} ({}ms)",
            outcome_icon(result.outcome),
            result.step_id,
            result.outcome,
            result.duration().as_millis()
        );
    }
}

/// Final result of every step that did not succeed
pub fn print_diagnostics(document: &ReportDocument) {
    let problems: Vec<_> = document
        .final_results()
        .into_iter()
        .filter(|r| r.outcome != StepOutcome::Succeeded)
        .collect();
    if problems.is_empty() {
        return;
    }

    println!("  Diagnostics:");
    for result in problems {
        println!(
            "    {} {} ({}): {}",
            outcome_icon(result.outcome),
            result.step_id,
            result.outcome,
            result.diagnostic
        );
    }
}

pub fn print_health(report: &HealthReport) {
    println!("{} Overall health: {}", health_icon(report.status), report.status);
    for snapshot in &report.snapshots {
        println!(
            "  {} {}: {} ({}ms)",
            health_icon(snapshot.status),
            snapshot.probe_id,
            snapshot.status,
            snapshot.latency_ms
        );
        if snapshot.status.is_problematic() {
            println!("      {}", snapshot.detail);
        }
    }
}
