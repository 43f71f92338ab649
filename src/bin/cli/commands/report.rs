//! `stagehand report`: show the last persisted run

use anyhow::Context;
use stagehand_core::constants::exit_codes;
use stagehand_core::report::ReportStore;

use crate::cli::output::{print_diagnostics, print_results, print_run_summary};
use crate::cli::CliContext;
use crate::ReportArgs;

pub async fn handle_report_command(args: ReportArgs, context: &CliContext) -> anyhow::Result<i32> {
    let path = match args.path {
        Some(path) => path,
        None => {
            let manager = context.load_config(None).context("loading configuration")?;
            ReportStore::from_config(&manager.config().report).last_report_path()
        }
    };

    if !path.exists() {
        eprintln!("No run report found at {}", path.display());
        return Ok(exit_codes::NO_REPORT);
    }

    let document = ReportStore::load(&path)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print_run_summary(&document);
        print_results(&document);
        if document.exit_code() != exit_codes::ALL_SUCCEEDED {
            print_diagnostics(&document);
        }
    }

    Ok(document.exit_code())
}
