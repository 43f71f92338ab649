#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, NLU in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Stagehand Core
//!
//! Dependency-ordered deployment steps with health verification, idempotent
//! retries and a machine-readable run report.
//!
//! ## Overview
//!
//! Bringing up a service stack (database, cache, vector store, NLU server,
//! reverse proxy) is a sequence of dependent operations, each of which has to
//! be confirmed healthy before the next can start. Stagehand models each
//! operation as a [`registry::Step`], orders steps by their dependencies,
//! runs them with retries, waits on readiness probes instead of fixed sleeps,
//! and records every attempt in a [`report::RunReport`].
//!
//! ## Module Organization
//!
//! - [`registry`] - Steps, dependency validation, YAML registry definitions
//! - [`orchestration`] - Scheduler, per-step executor, backoff, cancellation
//! - [`health`] - Probe contract, built-in probes, readiness waits, snapshots
//! - [`actions`] - Step action contract and built-in actions
//! - [`report`] - Append-only run report, sinks and persistence
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stagehand_core::actions::CommandAction;
//! use stagehand_core::orchestration::{DependencyScheduler, RunOptions};
//! use stagehand_core::registry::{Step, StepRegistry};
//!
//! # async fn example() -> stagehand_core::Result<()> {
//! let mut registry = StepRegistry::new();
//! registry.register(Step::new(
//!     "start_postgres",
//!     Arc::new(CommandAction::new("docker", vec!["compose".into(), "up".into(), "-d".into(), "postgres".into()])),
//! ))?;
//! registry.register(
//!     Step::new("migrate", Arc::new(CommandAction::new("./migrate.sh", vec![])))
//!         .depends_on(["start_postgres"]),
//! )?;
//!
//! let registry = registry.validate()?;
//! let report = DependencyScheduler::default()
//!     .run(&registry, RunOptions::default())
//!     .await?;
//! std::process::exit(report.summary().exit_code());
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod logging;
pub mod orchestration;
pub mod registry;
pub mod report;
pub mod utils;

pub use actions::{ActionContext, ActionOutcome, StepAction};
pub use config::{ConfigManager, StagehandConfig};
pub use constants::{HealthStatus, RunStatus, StepOutcome};
pub use error::{Result, StagehandError};
pub use health::{HealthVerifier, Probe, ProbeStatus};
pub use orchestration::{CancellationHandle, DependencyScheduler, RunOptions};
pub use registry::{RetryPolicy, Step, StepRegistry, ValidatedRegistry};
pub use report::{ReportStore, RunReport, StepResult};
