//! # Stagehand CLI
//!
//! Runs a deployment registry, shows the last run report, and checks the
//! health of configured services.

mod cli;

use clap::{Parser, Subcommand};
use stagehand_core::constants::exit_codes;
use stagehand_core::logging::init_structured_logging;
use std::path::PathBuf;
use tracing::info;

use cli::{handle_healthcheck_command, handle_report_command, handle_run_command, CliContext};

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Run dependent deployment steps with health verification and run reports")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Directory containing stagehand-config.yaml (default: ./config or STAGEHAND_CONFIG_DIR)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute the steps of a registry file in dependency order
    Run(RunArgs),

    /// Print the last persisted run report
    Report(ReportArgs),

    /// Check configured probes once and exit with the aggregate health
    Healthcheck(HealthcheckArgs),
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Registry definition (YAML)
    #[arg(value_name = "REGISTRY_FILE")]
    pub registry_file: PathBuf,

    /// Environment whose overrides apply (default: STAGEHAND_ENV or development)
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Maximum steps running at once (1 = sequential)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Skip steps that succeeded in the last persisted run
    #[arg(long)]
    pub resume: bool,

    /// Validate the registry and print the execution plan without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Where to persist the report (default: report.directory from config)
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    /// Report file (default: last-report.json in the report directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Print the raw JSON document
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct HealthcheckArgs {
    /// YAML file with probes (default: health.probes from config)
    #[arg(short, long)]
    pub probe_file: Option<PathBuf>,

    /// Aggregate timeout in seconds (default: health.snapshot_timeout_seconds)
    #[arg(short, long)]
    pub timeout_seconds: Option<u64>,

    /// Print snapshots as JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_guard = init_structured_logging(cli.verbose);

    let context = CliContext {
        config_dir: cli.config_dir,
    };

    info!(command = ?cli.command, "Stagehand CLI starting");

    let result = match cli.command {
        Commands::Run(args) => handle_run_command(args, &context).await,
        Commands::Report(args) => handle_report_command(args, &context).await,
        Commands::Healthcheck(args) => handle_healthcheck_command(args, &context).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("✗ {error:#}");
            cli::exit_code_for_error(&error)
        }
    };

    if code != exit_codes::ALL_SUCCEEDED {
        info!(exit_code = code, "Stagehand CLI exiting with failure");
    }
    // process::exit skips destructors; flush the JSON log file first
    drop(log_guard);
    std::process::exit(code);
}
