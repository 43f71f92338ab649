//! Registry Definition Files
//!
//! YAML description of a deployment: its steps, what each one runs, how its
//! readiness is checked and how it retries, plus per-environment overrides.
//!
//! ```yaml
//! name: chatbot-stack
//! defaults:
//!   retry: { max_attempts: 3, backoff: exponential }
//! steps:
//!   - name: start_postgres
//!     action: { type: command, program: docker, args: [compose, up, -d, postgres] }
//!     probe: { type: tcp, address: "127.0.0.1:5432" }
//!   - name: start_rasa
//!     depends_on_steps: [start_postgres]
//!     action: { type: command, program: docker, args: [compose, up, -d, rasa] }
//! environments:
//!   production:
//!     steps:
//!       - name: start_rasa
//!         timeout_seconds: 600
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use super::step::{FailureScope, RetryPolicy, Step};
use super::StepRegistry;
use crate::actions::ActionDefinition;
use crate::config::{BackoffKind, ExecutionConfig};
use crate::error::{Result, StagehandError};
use crate::health::ProbeDefinition;

/// Partial retry policy; unset fields inherit from the enclosing level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_to_dependents: Option<bool>,
}

impl RetryDefinition {
    /// Overlay the fields set here onto `base`
    pub fn apply_to(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            backoff: self.backoff.unwrap_or(base.backoff),
            failure_scope: self
                .fatal_to_dependents
                .map(FailureScope::from_fatal_to_dependents)
                .unwrap_or(base.failure_scope),
        }
    }

    /// Merge `other` over `self`, field by field
    fn merged_with(&self, other: &RetryDefinition) -> RetryDefinition {
        RetryDefinition {
            max_attempts: other.max_attempts.or(self.max_attempts),
            backoff: other.backoff.or(self.backoff),
            fatal_to_dependents: other.fatal_to_dependents.or(self.fatal_to_dependents),
        }
    }
}

/// File-wide defaults applied to every step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// One step as written in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Single dependency shorthand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on_step: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on_steps: Vec<String>,

    pub action: ActionDefinition,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl StepDefinition {
    /// All dependencies, shorthand first
    pub fn all_dependencies(&self) -> Vec<String> {
        self.depends_on_step
            .iter()
            .chain(self.depends_on_steps.iter())
            .cloned()
            .collect()
    }
}

/// Environment-specific replacement of step fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOverride {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub action: Option<ActionDefinition>,
    #[serde(default)]
    pub probe: Option<ProbeDefinition>,
    #[serde(default)]
    pub retry: Option<RetryDefinition>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentOverrides {
    #[serde(default)]
    pub defaults: Option<StepDefaults>,
    #[serde(default)]
    pub steps: Vec<StepOverride>,
}

/// A deployment described in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub defaults: StepDefaults,

    pub steps: Vec<StepDefinition>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environments: HashMap<String, EnvironmentOverrides>,
}

/// Steps and defaults after environment overrides have been applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDefinition {
    pub name: String,
    pub environment: String,
    pub defaults: StepDefaults,
    pub steps: Vec<StepDefinition>,
}

impl RegistryDefinition {
    /// Load a RegistryDefinition from YAML content
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let definition: RegistryDefinition = serde_yaml::from_str(yaml_content)?;
        Ok(definition)
    }

    /// Load a RegistryDefinition from a YAML file
    pub fn from_yaml_file(file_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(file_path).map_err(|e| {
            StagehandError::InvalidDefinition(format!(
                "Failed to read registry file {}: {e}",
                file_path.display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Apply the overrides declared for `environment`
    ///
    /// An override naming a step that does not exist is an error, so a typo
    /// in a production section cannot silently leave the base values active.
    pub fn resolve_for_environment(&self, environment: &str) -> Result<ResolvedDefinition> {
        let mut steps = self.steps.clone();
        let mut defaults = self.defaults.clone();

        if let Some(overrides) = self.environments.get(environment) {
            if let Some(env_defaults) = &overrides.defaults {
                defaults = StepDefaults {
                    retry: match (&defaults.retry, &env_defaults.retry) {
                        (Some(base), Some(over)) => Some(base.merged_with(over)),
                        (base, over) => over.clone().or_else(|| base.clone()),
                    },
                    timeout_seconds: env_defaults.timeout_seconds.or(defaults.timeout_seconds),
                };
            }

            let positions: HashMap<&str, usize> = self
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| (step.name.as_str(), i))
                .collect();

            for step_override in &overrides.steps {
                let Some(&position) = positions.get(step_override.name.as_str()) else {
                    return Err(StagehandError::InvalidDefinition(format!(
                        "environment '{environment}' overrides unknown step '{}'",
                        step_override.name
                    )));
                };
                apply_override(&mut steps[position], step_override);
            }
        }

        Ok(ResolvedDefinition {
            name: self.name.clone(),
            environment: environment.to_string(),
            defaults,
            steps,
        })
    }

    /// Resolve for `environment` and build a registry ready for validation
    ///
    /// Retry settings layer as: execution config, file defaults, step, with
    /// environment overrides already merged into the last two.
    pub fn build_registry(
        &self,
        environment: &str,
        execution: &ExecutionConfig,
    ) -> Result<StepRegistry> {
        let resolved = self.resolve_for_environment(environment)?;
        let base_policy = RetryPolicy::from_config(execution);
        let default_policy = match &resolved.defaults.retry {
            Some(retry) => checked_policy(&resolved.name, retry, base_policy)?,
            None => base_policy,
        };

        let mut registry = StepRegistry::new();
        let mut names = HashSet::new();

        for definition in &resolved.steps {
            if !names.insert(definition.name.as_str()) {
                return Err(StagehandError::DuplicateStepId(definition.name.clone()));
            }

            let action = definition.action.build(&definition.name)?;
            let retry_policy = match &definition.retry {
                Some(retry) => checked_policy(&definition.name, retry, default_policy)?,
                None => default_policy,
            };

            let mut step = Step::new(definition.name.clone(), action)
                .depends_on(definition.all_dependencies())
                .with_retry_policy(retry_policy);

            if let Some(description) = &definition.description {
                step = step.with_description(description.clone());
            }
            if let Some(probe) = &definition.probe {
                step = step.with_probe(probe.build(&definition.name)?);
            }
            match definition
                .timeout_seconds
                .or(resolved.defaults.timeout_seconds)
            {
                Some(0) => {
                    return Err(StagehandError::InvalidDefinition(format!(
                        "step '{}': timeout_seconds must be greater than 0",
                        definition.name
                    )))
                }
                Some(seconds) => step = step.with_timeout(Duration::from_secs(seconds)),
                None => {}
            }

            registry.register(step)?;
        }

        tracing::info!(
            registry = %resolved.name,
            environment = %environment,
            steps = registry.len(),
            "Registry definition loaded"
        );

        Ok(registry)
    }
}

fn checked_policy(owner: &str, retry: &RetryDefinition, base: RetryPolicy) -> Result<RetryPolicy> {
    if retry.max_attempts == Some(0) {
        return Err(StagehandError::InvalidDefinition(format!(
            "'{owner}': retry.max_attempts must be at least 1"
        )));
    }
    Ok(retry.apply_to(base))
}

fn apply_override(step: &mut StepDefinition, step_override: &StepOverride) {
    if let Some(description) = &step_override.description {
        step.description = Some(description.clone());
    }
    if let Some(action) = &step_override.action {
        step.action = action.clone();
    }
    if let Some(probe) = &step_override.probe {
        step.probe = Some(probe.clone());
    }
    if let Some(retry) = &step_override.retry {
        step.retry = Some(match &step.retry {
            Some(base) => base.merged_with(retry),
            None => retry.clone(),
        });
    }
    if let Some(timeout_seconds) = step_override.timeout_seconds {
        step.timeout_seconds = Some(timeout_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK_YAML: &str = r#"
name: chatbot-stack
description: Greek chatbot services
defaults:
  retry:
    max_attempts: 2
  timeout_seconds: 120
steps:
  - name: start_postgres
    action:
      type: command
      program: docker
      args: [compose, up, -d, postgres]
    probe:
      type: tcp
      address: "127.0.0.1:5432"
  - name: start_redis
    action:
      type: command
      program: docker
      args: [compose, up, -d, redis]
  - name: start_rasa
    depends_on_step: start_postgres
    depends_on_steps: [start_redis]
    action:
      type: command
      program: docker
      args: [compose, up, -d, rasa]
    retry:
      backoff: fixed
environments:
  production:
    defaults:
      timeout_seconds: 300
    steps:
      - name: start_rasa
        timeout_seconds: 900
        retry:
          max_attempts: 5
"#;

    #[test]
    fn test_parse_and_build_for_development() {
        let definition = RegistryDefinition::from_yaml(STACK_YAML).unwrap();
        assert_eq!(definition.steps.len(), 3);
        assert_eq!(
            definition.steps[2].all_dependencies(),
            vec!["start_postgres", "start_redis"]
        );

        let validated = definition
            .build_registry("development", &ExecutionConfig::default())
            .unwrap()
            .validate()
            .unwrap();

        let rasa = validated.get("start_rasa").unwrap();
        assert_eq!(rasa.retry_policy.max_attempts, 2);
        assert_eq!(rasa.retry_policy.backoff, BackoffKind::Fixed);
        assert_eq!(rasa.timeout, Some(Duration::from_secs(120)));
        assert!(validated.get("start_postgres").unwrap().probe.is_some());
        assert_eq!(
            validated.execution_order(),
            vec!["start_postgres", "start_redis", "start_rasa"]
        );
    }

    #[test]
    fn test_production_overrides_merge() {
        let definition = RegistryDefinition::from_yaml(STACK_YAML).unwrap();
        let resolved = definition.resolve_for_environment("production").unwrap();
        assert_eq!(resolved.defaults.timeout_seconds, Some(300));

        let rasa = &resolved.steps[2];
        assert_eq!(rasa.timeout_seconds, Some(900));
        let retry = rasa.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, Some(5));
        assert_eq!(retry.backoff, Some(BackoffKind::Fixed));

        let validated = definition
            .build_registry("production", &ExecutionConfig::default())
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(
            validated.get("start_redis").unwrap().timeout,
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_override_of_unknown_step_is_rejected() {
        let yaml = r#"
name: broken
steps:
  - name: only
    action: { type: noop }
environments:
  production:
    steps:
      - name: onyl
        timeout_seconds: 5
"#;
        let definition = RegistryDefinition::from_yaml(yaml).unwrap();
        assert!(definition.resolve_for_environment("development").is_ok());
        let err = definition.resolve_for_environment("production").unwrap_err();
        assert!(err.to_string().contains("onyl"));
    }

    #[test]
    fn test_duplicate_step_names_are_rejected() {
        let yaml = r#"
name: dup
steps:
  - name: same
    action: { type: noop }
  - name: same
    action: { type: noop }
"#;
        let err = RegistryDefinition::from_yaml(yaml)
            .unwrap()
            .build_registry("test", &ExecutionConfig::default())
            .unwrap_err();
        assert_eq!(err, StagehandError::DuplicateStepId("same".into()));
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let yaml = r#"
name: zero
steps:
  - name: step
    action: { type: noop }
    retry: { max_attempts: 0 }
"#;
        let err = RegistryDefinition::from_yaml(yaml)
            .unwrap()
            .build_registry("test", &ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, StagehandError::InvalidDefinition(_)));
    }

    #[test]
    fn test_malformed_yaml_is_invalid_definition() {
        let err = RegistryDefinition::from_yaml("name: [unclosed").unwrap_err();
        assert!(err.is_registration_error());
    }
}
