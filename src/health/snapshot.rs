//! # Health Snapshot
//!
//! One-shot check of a set of probes for monitoring. All probes run
//! concurrently under a shared deadline; a probe that has not answered when
//! the deadline passes is reported `Unknown` instead of stalling the others.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::probe::Probe;
use super::verifier::HealthVerifier;
use crate::constants::HealthStatus;

/// Point-in-time health of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub probe_id: String,
    pub checked_at: DateTime<Utc>,
    pub status: HealthStatus,
    pub detail: String,
    pub latency_ms: u64,
}

/// Snapshots for a probe set plus the worst-of status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub status: HealthStatus,
    pub snapshots: Vec<HealthSnapshot>,
}

impl HealthReport {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn problems(&self) -> impl Iterator<Item = &HealthSnapshot> {
        self.snapshots.iter().filter(|s| s.status.is_problematic())
    }
}

/// Worst status across snapshots; an empty set is `Unknown`
pub fn aggregate_status(snapshots: &[HealthSnapshot]) -> HealthStatus {
    snapshots
        .iter()
        .map(|snapshot| snapshot.status)
        .max()
        .unwrap_or(HealthStatus::Unknown)
}

impl HealthVerifier {
    /// Check every probe once, in parallel, bounded by `aggregate_timeout`
    ///
    /// Snapshots are returned in the order the probes were given.
    pub async fn snapshot(
        &self,
        probes: &[Arc<dyn Probe>],
        aggregate_timeout: Duration,
    ) -> HealthReport {
        let checked_at = Utc::now();
        let deadline = Instant::now() + aggregate_timeout;

        let snapshots = join_all(probes.iter().map(|probe| async move {
            let started = Instant::now();
            let result = tokio::time::timeout_at(deadline, probe.check()).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let (status, detail) = match result {
                Ok(probe_status) => (probe_status.health_status(), probe_status.to_string()),
                Err(_) => (
                    HealthStatus::Unknown,
                    format!("no answer within {aggregate_timeout:?}"),
                ),
            };

            HealthSnapshot {
                probe_id: probe.id().to_string(),
                checked_at: Utc::now(),
                status,
                detail,
                latency_ms,
            }
        }))
        .await;

        let status = aggregate_status(&snapshots);
        tracing::info!(
            probes = snapshots.len(),
            status = %status,
            "Health snapshot complete"
        );

        HealthReport {
            checked_at,
            status,
            snapshots,
        }
    }
}
