//! `stagehand healthcheck`: one-shot snapshot of configured probes

use anyhow::Context;
use serde::Deserialize;
use stagehand_core::constants::HealthStatus;
use stagehand_core::health::definition::build_probes;
use stagehand_core::health::{HealthVerifier, NamedProbeDefinition, PollPolicy};
use stagehand_core::StagehandError;
use std::path::Path;
use std::time::Duration;

use crate::cli::output::print_health;
use crate::cli::CliContext;
use crate::HealthcheckArgs;

/// Probe files may be a bare list or a mapping with a `probes` key
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProbeFile {
    List(Vec<NamedProbeDefinition>),
    Wrapped { probes: Vec<NamedProbeDefinition> },
}

fn read_probe_file(path: &Path) -> Result<Vec<NamedProbeDefinition>, StagehandError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StagehandError::ConfigurationError(format!("cannot read {}: {e}", path.display()))
    })?;
    let parsed: ProbeFile = serde_yaml::from_str(&content)?;
    Ok(match parsed {
        ProbeFile::List(probes) | ProbeFile::Wrapped { probes } => probes,
    })
}

pub async fn handle_healthcheck_command(
    args: HealthcheckArgs,
    context: &CliContext,
) -> anyhow::Result<i32> {
    let manager = context.load_config(None).context("loading configuration")?;
    let health = &manager.config().health;

    let definitions = match &args.probe_file {
        Some(path) => {
            read_probe_file(path).with_context(|| format!("reading probes from {}", path.display()))?
        }
        None => health.probes.clone(),
    };
    let probes = build_probes(&definitions).context("building probes")?;

    if probes.is_empty() {
        eprintln!("No probes configured (health.probes is empty and no --probe-file given)");
        return Ok(HealthStatus::Unknown.exit_code());
    }

    let timeout = args
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| health.snapshot_timeout());
    let verifier = HealthVerifier::new(PollPolicy::from_config(health));
    let report = verifier.snapshot(&probes, timeout).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_health(&report);
    }

    Ok(report.exit_code())
}
