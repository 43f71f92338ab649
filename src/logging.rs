//! # Structured Logging Module
//!
//! Environment-aware structured logging that writes human-readable output to
//! stderr and JSON lines to a per-process file under `log/`, so a failed
//! deployment run can be inspected after the terminal is gone.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `verbosity` raises the console level above the environment default
/// (`-v` debug, `-vv` trace). `RUST_LOG` wins over both when set.
///
/// Returns the guard of the JSON file writer on the first call. Lines queued
/// for the file are only flushed when the guard drops, so the caller must
/// hold it until just before the process exits.
pub fn init_structured_logging(verbosity: u8) -> Option<WorkerGuard> {
    let mut guard = None;
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = match verbosity {
            0 => get_log_level(&environment),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };

        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&log_level));

        let log_dir = PathBuf::from("log");
        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        // File output is best effort: a read-only working directory must not
        // stop a deployment run.
        let (file_layer, file_guard) = match json_file_writer(&log_dir, &log_filename) {
            Ok((writer, file_guard)) => {
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(build_filter(&log_level));
                (Some(layer), Some(file_guard))
            }
            Err(_) => (None, None),
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::debug!(
            pid = pid,
            environment = %environment,
            log_file = %log_dir.join(&log_filename).display(),
            file_output = file_guard.is_some(),
            "Structured logging initialized"
        );

        guard = file_guard;
    });
    guard
}

/// Non-blocking writer appending to `directory/filename`
fn json_file_writer(
    directory: &Path,
    filename: &str,
) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(directory)?;
    let file_appender = tracing_appender::rolling::never(directory, filename);
    Ok(tracing_appender::non_blocking(file_appender))
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("STAGEHAND_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "info".to_string(),
    }
}

/// Log structured data for run lifecycle events
pub fn log_run_operation(operation: &str, run_id: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        run_id = %run_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RUN_OPERATION"
    );
}

/// Log structured data for step operations
pub fn log_step_operation(
    operation: &str,
    step_id: &str,
    attempt: Option<u32>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        step_id = %step_id,
        attempt = attempt,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "STEP_OPERATION"
    );
}

/// Log structured data for readiness probe polls
pub fn log_probe_operation(operation: &str, probe_id: &str, status: &str, details: Option<&str>) {
    tracing::debug!(
        operation = %operation,
        probe_id = %probe_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PROBE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
