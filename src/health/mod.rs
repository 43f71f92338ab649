//! # Health Verification
//!
//! Readiness probes for the services a deployment brings up, the poll loop
//! that waits for a probe to report ready, and the one-shot snapshot used by
//! the `healthcheck` command.

pub mod definition;
pub mod probe;
pub mod probes;
pub mod snapshot;
pub mod verifier;

pub use definition::{NamedProbeDefinition, ProbeDefinition};
pub use probe::{Probe, ProbeStatus};
pub use probes::{CommandProbe, HttpProbe, TcpProbe};
pub use snapshot::{aggregate_status, HealthReport, HealthSnapshot};
pub use verifier::{HealthVerifier, PollPolicy, Readiness};
