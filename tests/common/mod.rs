//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod doubles;
pub mod strategies;
pub mod stub_server;

pub use doubles::*;
pub use stub_server::StubServer;

use stagehand_core::health::{HealthVerifier, PollPolicy};
use stagehand_core::orchestration::{BackoffCalculator, DependencyScheduler};
use stagehand_core::registry::{RetryPolicy, Step, StepRegistry, ValidatedRegistry};
use stagehand_core::StepAction;
use std::sync::Arc;
use std::time::Duration;

/// Scheduler with short, fixed timings so paused-clock tests stay readable
pub fn fast_scheduler() -> DependencyScheduler {
    DependencyScheduler::new(
        HealthVerifier::new(PollPolicy::constant(Duration::from_millis(100))),
        BackoffCalculator::new(Duration::from_millis(10), Duration::from_millis(100), 2.0),
    )
}

/// Step with the given dependencies and three attempts
pub fn step(id: &str, deps: &[&str], action: Arc<dyn StepAction>) -> Step {
    Step::new(id, action)
        .depends_on(deps.iter().copied())
        .with_retry_policy(RetryPolicy::once().with_max_attempts(3))
}

pub fn validated(steps: Vec<Step>) -> ValidatedRegistry {
    let mut registry = StepRegistry::new();
    for step in steps {
        registry.register(step).expect("step registers");
    }
    registry.validate().expect("registry validates")
}
