//! `stagehand run`: execute a registry file

use anyhow::Context;
use stagehand_core::constants::exit_codes;
use stagehand_core::logging::log_error;
use stagehand_core::orchestration::{CancellationHandle, DependencyScheduler, RunOptions};
use stagehand_core::registry::RegistryDefinition;
use stagehand_core::report::{JsonLinesSink, ReportStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::output::{print_diagnostics, print_plan, print_run_summary};
use crate::cli::CliContext;
use crate::RunArgs;

pub async fn handle_run_command(args: RunArgs, context: &CliContext) -> anyhow::Result<i32> {
    let manager = context
        .load_config(args.environment.as_deref())
        .context("loading configuration")?;
    let config = manager.config();
    let environment = manager.environment();

    let definition = RegistryDefinition::from_yaml_file(&args.registry_file)
        .with_context(|| format!("reading registry {}", args.registry_file.display()))?;
    let registry = definition
        .build_registry(environment, &config.execution)
        .and_then(|registry| registry.validate())
        .with_context(|| format!("validating registry '{}'", definition.name))?;

    if args.dry_run {
        print_plan(&definition.name, environment, &registry);
        return Ok(exit_codes::ALL_SUCCEEDED);
    }

    let store = match &args.report_dir {
        Some(directory) => ReportStore::new(directory.clone()),
        None => ReportStore::from_config(&config.report),
    };

    let previously_succeeded: HashSet<String> = if args.resume {
        let satisfied = store
            .previously_satisfied()
            .context("reading the previous run report for --resume")?;
        info!(steps = satisfied.len(), "Resuming from previous run");
        satisfied
    } else {
        HashSet::new()
    };

    let cancellation = CancellationHandle::new();
    let mut options = RunOptions::from_config(config)
        .with_label(definition.name.clone())
        .with_previously_succeeded(previously_succeeded)
        .with_cancellation(cancellation.clone());
    if let Some(concurrency) = args.concurrency {
        options = options.with_concurrency(concurrency);
    }

    match JsonLinesSink::open(store.step_log_path(), options.run_id) {
        Ok(sink) => options = options.with_sink(Arc::new(sink)),
        Err(e) => warn!(error = %e, "Step log unavailable; continuing without it"),
    }

    let signal_handle = cancellation.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancellation requested; waiting for running steps to finish...");
            signal_handle.cancel();
        }
    });

    println!(
        "Running '{}' ({} steps, environment {environment})",
        definition.name,
        registry.len()
    );

    let scheduler = DependencyScheduler::from_config(config);
    let result = scheduler.run(&registry, options).await;
    signal_task.abort();
    let report = result.context("executing registry")?;

    match store.persist(&report) {
        Ok(path) => info!(path = %path.display(), "Report written"),
        Err(e) => {
            log_error("run", "persist_report", &e.to_string(), None);
            eprintln!("⚠ Could not persist the run report: {e}");
        }
    }

    let document = report.to_document();
    print_run_summary(&document);

    let code = document.exit_code();
    if code != exit_codes::ALL_SUCCEEDED {
        print_diagnostics(&document);
    }
    Ok(code)
}
