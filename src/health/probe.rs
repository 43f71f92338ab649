//! Probe contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::HealthStatus;

/// Result of a single readiness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeStatus {
    Ready,
    /// The service answered but is not ready yet, or did not answer at all
    NotReady(String),
    /// The probe itself is broken (bad payload, missing binary, bad address)
    Error(String),
}

impl ProbeStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Ready => "ready",
            Self::NotReady(detail) | Self::Error(detail) => detail,
        }
    }

    /// Snapshot mapping: Ready is healthy, NotReady degraded, Error unhealthy
    pub fn health_status(&self) -> HealthStatus {
        match self {
            Self::Ready => HealthStatus::Healthy,
            Self::NotReady(_) => HealthStatus::Degraded,
            Self::Error(_) => HealthStatus::Unhealthy,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::NotReady(detail) => write!(f, "not_ready: {detail}"),
            Self::Error(detail) => write!(f, "error: {detail}"),
        }
    }
}

/// A readiness check against an external service
///
/// Implementations must be cheap to call repeatedly and must not hold locks
/// across the network call. Failures are reported through [`ProbeStatus`],
/// never by panicking.
#[async_trait]
pub trait Probe: Send + Sync + fmt::Debug {
    /// Stable identifier used in logs, snapshots and errors
    fn id(&self) -> &str;

    async fn check(&self) -> ProbeStatus;
}
