//! Probe definitions as they appear in config and registry YAML files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::probe::Probe;
use super::probes::{CommandProbe, HttpProbe, TcpProbe};
use crate::error::{Result, StagehandError};

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

/// Declarative probe, tagged by `type`
///
/// ```yaml
/// type: http
/// url: http://localhost:6333/readyz
/// expect_status: [200]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeDefinition {
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expect_status: Vec<u16>,
        /// JSON pointer (`/status/ready`) or dotted path (`status.ready`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        json_field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_value: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
    Tcp {
        address: String,
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl ProbeDefinition {
    /// Build the runtime probe, reporting itself under `id`
    pub fn build(&self, id: &str) -> Result<Arc<dyn Probe>> {
        match self {
            Self::Http {
                url,
                expect_status,
                json_field,
                expect_value,
                headers,
                request_timeout_ms,
            } => {
                if json_field.is_none() && expect_value.is_some() {
                    return Err(StagehandError::InvalidDefinition(format!(
                        "probe '{id}': expect_value requires json_field"
                    )));
                }
                let mut probe = HttpProbe::new(id, url, Duration::from_millis(*request_timeout_ms))?
                    .expect_status(expect_status.clone());
                if let Some(field) = json_field {
                    probe = probe.expect_json(field, expect_value.clone());
                }
                for (name, value) in headers {
                    probe = probe.with_header(name, value);
                }
                Ok(Arc::new(probe))
            }
            Self::Tcp {
                address,
                connect_timeout_ms,
            } => {
                if address.trim().is_empty() {
                    return Err(StagehandError::InvalidDefinition(format!(
                        "probe '{id}': tcp address is empty"
                    )));
                }
                Ok(Arc::new(TcpProbe::new(
                    id,
                    address.clone(),
                    Duration::from_millis(*connect_timeout_ms),
                )))
            }
            Self::Command { program, args } => {
                if program.trim().is_empty() {
                    return Err(StagehandError::InvalidDefinition(format!(
                        "probe '{id}': command program is empty"
                    )));
                }
                Ok(Arc::new(CommandProbe::new(id, program.clone(), args.clone())))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Tcp { .. } => "tcp",
            Self::Command { .. } => "command",
        }
    }
}

/// Probe with its own id, as listed under `health.probes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedProbeDefinition {
    pub id: String,
    #[serde(flatten)]
    pub probe: ProbeDefinition,
}

impl NamedProbeDefinition {
    pub fn build(&self) -> Result<Arc<dyn Probe>> {
        self.probe.build(&self.id)
    }
}

/// Build every named probe, failing on the first invalid definition
pub fn build_probes(definitions: &[NamedProbeDefinition]) -> Result<Vec<Arc<dyn Probe>>> {
    definitions.iter().map(NamedProbeDefinition::build).collect()
}
