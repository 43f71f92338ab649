//! # Orchestration Engine
//!
//! Runs a validated step registry against live services.
//!
//! ## Core Components
//!
//! - **DependencyScheduler**: dispatches steps in dependency order, sequentially
//!   or with bounded concurrency, and propagates failures to dependents
//! - **StepExecutor**: drives a single step through its attempts, including the
//!   readiness wait after the action
//! - **BackoffCalculator**: delay between attempts (fixed or exponential, capped)
//! - **CancellationHandle**: cooperative stop signal checked between steps,
//!   attempts and polls

pub mod backoff;
pub mod cancellation;
pub mod scheduler;
pub mod step_executor;

pub use backoff::BackoffCalculator;
pub use cancellation::CancellationHandle;
pub use scheduler::{DependencyScheduler, RunOptions};
pub use step_executor::StepExecutor;
