//! The configuration and registry shipped in `config/` load and validate.

use stagehand_core::config::{BackoffKind, ConfigManager};
use stagehand_core::registry::RegistryDefinition;
use std::path::PathBuf;

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[test]
fn test_shipped_config_loads_per_environment() {
    let production = ConfigManager::load_from_directory_with_env(Some(config_dir()), "production").unwrap();
    assert_eq!(production.environment(), "production");
    assert_eq!(production.config().execution.max_attempts, 5);
    assert_eq!(production.config().execution.backoff, BackoffKind::Exponential);
    assert!(production.config().health.probe_errors_retryable);
    assert_eq!(production.config().health.probes.len(), 5);

    let test = ConfigManager::load_from_directory_with_env(Some(config_dir()), "test").unwrap();
    assert_eq!(test.config().execution.max_attempts, 1);
    assert_eq!(test.config().health.poll_interval_ms, 50);
}

#[test]
fn test_chatbot_registry_validates() {
    let manager = ConfigManager::load_from_directory_with_env(Some(config_dir()), "development").unwrap();
    let definition =
        RegistryDefinition::from_yaml_file(&config_dir().join("registries/chatbot-stack.yaml")).unwrap();

    let registry = definition
        .build_registry("production", &manager.config().execution)
        .unwrap()
        .validate()
        .unwrap();

    let order = registry.execution_order();
    assert_eq!(order.len(), 9);
    assert_eq!(order.last().map(String::as_str), Some("start_nginx"));
    let position = |id: &str| order.iter().position(|s| s == id).unwrap();
    assert!(position("start_postgres") < position("start_rasa"));
    assert!(position("start_rasa") < position("load_model"));
    assert!(position("start_qdrant") < position("create_faq_collection"));
    assert_eq!(
        registry.get("start_rasa").unwrap().retry_policy.max_attempts,
        5
    );
    assert_eq!(
        registry.dependents_of("start_rasa"),
        vec!["load_model", "start_nginx"]
    );
}
