//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery, merging of
//! the active environment's section over the base document, `STAGEHAND_*`
//! variable overrides and validation.

use super::error::{ConfigResult, ConfigurationError};
use super::{BackoffKind, StagehandConfig};
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAMES: [&str; 2] = ["stagehand-config.yaml", "stagehand-config.yml"];
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Loaded configuration plus the context it was resolved in
#[derive(Debug)]
pub struct ConfigManager {
    config: StagehandConfig,
    environment: String,
    config_directory: PathBuf,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    ///
    /// An explicitly given directory must contain a config file; the default
    /// directory may be absent, in which case defaults apply.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let explicit = config_dir.is_some() || env::var("STAGEHAND_CONFIG_DIR").is_ok();
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let (mut config, source_file) = match Self::find_config_file(&config_directory) {
            Ok(path) => (Self::load_and_merge_config(&path, environment)?, Some(path)),
            Err(err) if explicit => return Err(err),
            Err(_) => {
                warn!(
                    directory = %config_directory.display(),
                    "No configuration file found, using built-in defaults"
                );
                (StagehandConfig::default(), None)
            }
        };

        Self::apply_env_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            max_attempts = config.execution.max_attempts,
            backoff = %config.execution.backoff,
            concurrency = config.execution.concurrency,
            probes = config.health.probes.len(),
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
            source_file,
        }))
    }

    /// Build a manager around an in-memory configuration
    pub fn from_config(config: StagehandConfig, environment: &str) -> ConfigResult<ConfigManager> {
        config.validate()?;
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
            source_file: None,
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &StagehandConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// File the configuration was read from, if any
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Get sanitized configuration for debugging/logging that masks sensitive fields
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        crate::logging::get_environment()
    }

    fn default_config_directory() -> PathBuf {
        env::var("STAGEHAND_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in CONFIG_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.is_file() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    /// Safely read a configuration file with a size limit
    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!(
                    "Configuration file too large ({} bytes > {} byte limit)",
                    metadata.len(),
                    MAX_CONFIG_FILE_SIZE
                ),
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    /// Load and merge configuration with environment-specific overrides
    fn load_and_merge_config(config_file: &Path, environment: &str) -> ConfigResult<StagehandConfig> {
        let yaml_content = Self::read_config_file_safely(config_file)?;
        Self::parse_with_environment(&yaml_content, environment)
            .map_err(|e| ConfigurationError::invalid_yaml(config_file.display().to_string(), e))
    }

    /// Parse a YAML document and merge the section for `environment` over it
    pub fn parse_with_environment(
        yaml_content: &str,
        environment: &str,
    ) -> Result<StagehandConfig, serde_yaml::Error> {
        let mut yaml_data: YamlValue = serde_yaml::from_str(yaml_content)?;
        if yaml_data.is_null() {
            yaml_data = YamlValue::Mapping(Default::default());
        }

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!("Applying environment-specific overrides for: {}", environment);
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(YamlValue::String(section.to_string()));
            }
            map.remove(YamlValue::String(environment.to_string()));
        }

        serde_yaml::from_value(yaml_data)
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }

    /// Apply `STAGEHAND_*` overrides; `lookup` is injectable for tests
    pub fn apply_env_overrides<F>(config: &mut StagehandConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> ConfigResult<T>
        where
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigurationError::environment_override(key, e))
        }

        if let Some(raw) = lookup("STAGEHAND_MAX_ATTEMPTS") {
            config.execution.max_attempts = parse("STAGEHAND_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("STAGEHAND_BACKOFF") {
            config.execution.backoff = parse::<BackoffKind>("STAGEHAND_BACKOFF", &raw)?;
        }
        if let Some(raw) = lookup("STAGEHAND_TIMEOUT_PER_STEP_SECONDS") {
            config.execution.timeout_per_step_seconds =
                parse("STAGEHAND_TIMEOUT_PER_STEP_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("STAGEHAND_CONCURRENCY") {
            config.execution.concurrency = parse("STAGEHAND_CONCURRENCY", &raw)?;
        }
        if let Some(raw) = lookup("STAGEHAND_FATAL_TO_DEPENDENTS") {
            config.execution.fatal_to_dependents = parse("STAGEHAND_FATAL_TO_DEPENDENTS", &raw)?;
        }
        if let Some(raw) = lookup("STAGEHAND_POLL_INTERVAL_MS") {
            config.health.poll_interval_ms = parse("STAGEHAND_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("STAGEHAND_REPORT_DIR") {
            config.report.directory = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Sanitize configuration for safe logging by masking sensitive fields
    fn sanitize_config_for_logging(config: &StagehandConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "credential", "auth"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = serde_json::Value::String("[MASKED]".to_string());
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
