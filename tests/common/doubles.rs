//! Scripted actions and probes for driving the scheduler and verifier.

use async_trait::async_trait;
use parking_lot::Mutex;
use stagehand_core::actions::{ActionContext, ActionOutcome, StepAction};
use stagehand_core::health::{Probe, ProbeStatus};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ordered record of action starts and ends across steps
#[derive(Debug, Default)]
pub struct CallLog {
    events: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn started(&self, step_id: &str) {
        self.events.lock().push(format!("start:{step_id}"));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn finished(&self, step_id: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(format!("end:{step_id}"));
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn first_position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }

    pub fn last_position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().rposition(|e| e == event)
    }
}

/// Plays back scripted outcomes, then repeats the fallback
#[derive(Debug)]
pub struct ScriptedAction {
    script: Mutex<VecDeque<ActionOutcome>>,
    fallback: ActionOutcome,
    calls: AtomicU32,
    delay: Option<Duration>,
    log: Option<Arc<CallLog>>,
}

impl ScriptedAction {
    fn scripted(script: Vec<ActionOutcome>, fallback: ActionOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            delay: None,
            log: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::scripted(Vec::new(), ActionOutcome::Completed)
    }

    pub fn always_failing(detail: &str) -> Self {
        Self::scripted(Vec::new(), ActionOutcome::Failed(detail.to_string()))
    }

    /// Fails `times` times, then succeeds
    pub fn failing_times(times: usize, detail: &str) -> Self {
        Self::scripted(
            vec![ActionOutcome::Failed(detail.to_string()); times],
            ActionOutcome::Completed,
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_log(mut self, log: Arc<CallLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepAction for ScriptedAction {
    async fn execute(&self, context: &ActionContext) -> ActionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.started(&context.step_id);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        if let Some(log) = &self.log {
            log.finished(&context.step_id);
        }
        outcome
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Panics on every call
#[derive(Debug, Default)]
pub struct PanickingAction;

#[async_trait]
impl StepAction for PanickingAction {
    async fn execute(&self, _context: &ActionContext) -> ActionOutcome {
        panic!("configuration template missing");
    }
}

/// Plays back scripted statuses, then repeats the fallback
#[derive(Debug)]
pub struct ScriptedProbe {
    id: String,
    script: Mutex<VecDeque<ProbeStatus>>,
    fallback: ProbeStatus,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedProbe {
    pub fn new(id: &str, script: Vec<ProbeStatus>, fallback: ProbeStatus) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    /// NotReady `times` times, then Ready
    pub fn ready_after(id: &str, times: usize) -> Self {
        Self::new(
            id,
            vec![ProbeStatus::NotReady("starting".to_string()); times],
            ProbeStatus::Ready,
        )
    }

    pub fn never_ready(id: &str) -> Self {
        Self::new(id, Vec::new(), ProbeStatus::NotReady("still starting".to_string()))
    }

    pub fn erroring(id: &str, detail: &str) -> Self {
        Self::new(id, Vec::new(), ProbeStatus::Error(detail.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn id(&self) -> &str {
        &self.id
    }

    async fn check(&self) -> ProbeStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
