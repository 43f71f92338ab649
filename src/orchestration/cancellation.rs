//! # Cooperative Cancellation
//!
//! A cloneable flag plus wakeup used to stop a run. Cancellation is only
//! observed at safe points: between steps, between attempts and between
//! readiness polls. An action that is already running is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Handle shared between the caller (Ctrl-C handler, tests) and a run
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    state: Arc<CancellationState>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested");
        }
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            // Notified registers interest at creation, so a cancel between the
            // check and the await is not lost.
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
