//! Action definitions as they appear in registry YAML files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{
    CommandAction, EnsureDirectoryAction, HttpAction, NoopAction, StepAction, WriteFileAction,
};
use crate::error::{Result, StagehandError};

fn default_method() -> String {
    "POST".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

/// Declarative action, tagged by `type`
///
/// ```yaml
/// type: command
/// program: docker
/// args: [compose, up, -d, qdrant]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDefinition {
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
    },
    Http {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expect_status: Vec<u16>,
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
    EnsureDirectory {
        path: PathBuf,
    },
    WriteFile {
        path: PathBuf,
        contents: String,
        #[serde(default = "default_true")]
        create_parents: bool,
    },
    Noop,
}

impl ActionDefinition {
    /// Build the runtime action for step `step_id`
    pub fn build(&self, step_id: &str) -> Result<Arc<dyn StepAction>> {
        let invalid =
            |reason: String| StagehandError::InvalidDefinition(format!("step '{step_id}': {reason}"));

        let action: Arc<dyn StepAction> = match self {
            Self::Command {
                program,
                args,
                env,
                working_dir,
            } => {
                if program.trim().is_empty() {
                    return Err(invalid("command program is empty".to_string()));
                }
                let mut action = CommandAction::new(program.clone(), args.clone()).with_env(env.clone());
                if let Some(dir) = working_dir {
                    action = action.in_directory(dir.clone());
                }
                Arc::new(action)
            }
            Self::Http {
                url,
                method,
                body,
                headers,
                expect_status,
                request_timeout_ms,
            } => {
                let mut action =
                    HttpAction::new(method, url, Duration::from_millis(*request_timeout_ms))
                        .map_err(|e| invalid(e.to_string()))?
                        .expect_status(expect_status.clone());
                if let Some(body) = body {
                    action = action.with_json_body(body.clone());
                }
                for (name, value) in headers {
                    action = action.with_header(name, value);
                }
                Arc::new(action)
            }
            Self::EnsureDirectory { path } => Arc::new(EnsureDirectoryAction::new(path.clone())),
            Self::WriteFile {
                path,
                contents,
                create_parents,
            } => Arc::new(
                WriteFileAction::new(path.clone(), contents.clone()).create_parents(*create_parents),
            ),
            Self::Noop => Arc::new(NoopAction),
        };

        Ok(action)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Http { .. } => "http",
            Self::EnsureDirectory { .. } => "ensure_directory",
            Self::WriteFile { .. } => "write_file",
            Self::Noop => "noop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kinds_from_yaml() {
        let actions: Vec<ActionDefinition> = serde_yaml::from_str(
            r#"
- type: command
  program: docker
  args: [compose, up, -d, redis]
- type: http
  url: "http://localhost:5005/model"
  method: put
  body: { model_file: "models/latest.tar.gz" }
  expect_status: [204]
- type: ensure_directory
  path: /var/lib/chatbot
- type: write_file
  path: /etc/chatbot/.env
  contents: "LANG=el\n"
- type: noop
"#,
        )
        .unwrap();

        let kinds: Vec<&str> = actions.iter().map(ActionDefinition::kind).collect();
        assert_eq!(
            kinds,
            vec!["command", "http", "ensure_directory", "write_file", "noop"]
        );
        assert!(matches!(
            &actions[3],
            ActionDefinition::WriteFile { create_parents: true, .. }
        ));

        for action in &actions {
            action.build("step").unwrap();
        }
    }

    #[test]
    fn test_http_defaults_to_post() {
        let action: ActionDefinition =
            serde_yaml::from_str("type: http\nurl: http://localhost/").unwrap();
        assert!(matches!(action, ActionDefinition::Http { ref method, .. } if method == "POST"));
    }

    #[test]
    fn test_empty_program_is_invalid() {
        let action = ActionDefinition::Command {
            program: " ".into(),
            args: vec![],
            env: BTreeMap::new(),
            working_dir: None,
        };
        let err = action.build("broken").unwrap_err();
        assert!(err.to_string().contains("step 'broken'"));
    }
}
