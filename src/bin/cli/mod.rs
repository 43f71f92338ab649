//! CLI module for the Stagehand CLI tool
//!
//! Command handlers return the process exit code; errors that escape a
//! handler are mapped to an exit code by [`exit_code_for_error`].

pub mod commands;
pub mod output;

use stagehand_core::config::{ConfigManager, ConfigurationError};
use stagehand_core::constants::exit_codes;
use stagehand_core::StagehandError;
use std::path::PathBuf;
use std::sync::Arc;

pub use commands::{handle_healthcheck_command, handle_report_command, handle_run_command};

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config_dir: Option<PathBuf>,
}

impl CliContext {
    pub fn load_config(&self, environment: Option<&str>) -> Result<Arc<ConfigManager>, ConfigurationError> {
        let environment = environment
            .map(str::to_lowercase)
            .unwrap_or_else(ConfigManager::detect_environment);
        ConfigManager::load_from_directory_with_env(self.config_dir.clone(), &environment)
    }
}

/// Configuration and registration problems exit 78; anything else is internal
pub fn exit_code_for_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigurationError>().is_some() {
        return exit_codes::CONFIGURATION_ERROR;
    }
    match error.downcast_ref::<StagehandError>() {
        Some(StagehandError::ConfigurationError(_)) => exit_codes::CONFIGURATION_ERROR,
        Some(e) if e.is_registration_error() => exit_codes::CONFIGURATION_ERROR,
        _ => exit_codes::INTERNAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportArgs, RunArgs};
    use anyhow::Context;
    use std::fs;

    fn context_for(config_dir: &std::path::Path) -> CliContext {
        CliContext {
            config_dir: Some(config_dir.to_path_buf()),
        }
    }

    #[test]
    fn test_configuration_error_exits_78() {
        let error = anyhow::Error::new(ConfigurationError::validation_error(
            "execution.concurrency must be at least 1",
        ));
        assert_eq!(exit_code_for_error(&error), exit_codes::CONFIGURATION_ERROR);
    }

    #[test]
    fn test_cycle_behind_context_exits_78() {
        let result: Result<(), StagehandError> = Err(StagehandError::CyclicDependency(vec![
            "start_rasa".to_string(),
            "load_model".to_string(),
            "start_rasa".to_string(),
        ]));
        let error = result
            .context("validating registry 'chatbot-stack'")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&error), exit_codes::CONFIGURATION_ERROR);
    }

    #[test]
    fn test_report_storage_error_exits_70() {
        let error = anyhow::Error::new(StagehandError::ReportStorage(
            "disk full writing last-report.json".to_string(),
        ));
        assert_eq!(exit_code_for_error(&error), exit_codes::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_report_without_persisted_run_exits_66() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReportArgs {
            path: Some(dir.path().join("last-report.json")),
            json: false,
        };

        let code = handle_report_command(args, &context_for(dir.path()))
            .await
            .unwrap();
        assert_eq!(code, exit_codes::NO_REPORT);
    }

    #[tokio::test]
    async fn test_dry_run_validates_without_executing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stagehand-config.yaml"), "execution:\n  concurrency: 1\n").unwrap();
        let marker = dir.path().join("marker.txt");
        let registry_file = dir.path().join("registry.yaml");
        fs::write(
            &registry_file,
            format!(
                "name: dry\nsteps:\n  - name: write_marker\n    action:\n      type: write_file\n      path: \"{}\"\n      contents: \"ran\"\n",
                marker.display()
            ),
        )
        .unwrap();
        let report_dir = dir.path().join("runs");
        let args = RunArgs {
            registry_file,
            environment: Some("test".to_string()),
            concurrency: None,
            resume: false,
            dry_run: true,
            report_dir: Some(report_dir.clone()),
        };

        let code = handle_run_command(args, &context_for(dir.path()))
            .await
            .unwrap();

        assert_eq!(code, exit_codes::ALL_SUCCEEDED);
        assert!(!marker.exists());
        assert!(!report_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_config_file_exits_78() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            registry_file: dir.path().join("registry.yaml"),
            environment: None,
            concurrency: None,
            resume: false,
            dry_run: true,
            report_dir: None,
        };

        let error = handle_run_command(args, &context_for(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(exit_code_for_error(&error), exit_codes::CONFIGURATION_ERROR);
    }
}
