//! Command handlers for the Stagehand CLI

pub mod healthcheck;
pub mod report;
pub mod run;

pub use healthcheck::handle_healthcheck_command;
pub use report::handle_report_command;
pub use run::handle_run_command;
