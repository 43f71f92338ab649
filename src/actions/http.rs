//! HTTP request action, e.g. loading a model into the NLU server or creating
//! a vector collection. The endpoint must treat repeated calls as no-ops.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use std::time::Duration;

use super::{ActionContext, ActionOutcome, StepAction};
use crate::error::{Result, StagehandError};
use crate::utils::text::{excerpt, DEFAULT_EXCERPT_CHARS};

#[derive(Debug, Clone)]
pub struct HttpAction {
    client: Client,
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
    headers: Vec<(String, String)>,
    expect_status: Vec<u16>,
}

impl HttpAction {
    pub fn new(method: &str, url: &str, request_timeout: Duration) -> Result<Self> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|e| {
            StagehandError::InvalidDefinition(format!("invalid HTTP method '{method}': {e}"))
        })?;
        let url = Url::parse(url)
            .map_err(|e| StagehandError::InvalidDefinition(format!("invalid url '{url}': {e}")))?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StagehandError::ConfigurationError(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            method,
            url,
            body: None,
            headers: Vec::new(),
            expect_status: Vec::new(),
        })
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Accepted status codes; empty accepts any 2xx
    pub fn expect_status(mut self, codes: Vec<u16>) -> Self {
        self.expect_status = codes;
        self
    }

    fn accepts(&self, status: reqwest::StatusCode) -> bool {
        if self.expect_status.is_empty() {
            status.is_success()
        } else {
            self.expect_status.contains(&status.as_u16())
        }
    }
}

#[async_trait]
impl StepAction for HttpAction {
    async fn execute(&self, context: &ActionContext) -> ActionOutcome {
        let mut request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .header("X-Stagehand-Step", context.step_id.as_str());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return ActionOutcome::Failed(format!("{} {} failed: {e}", self.method, self.url))
            }
        };

        let status = response.status();
        if self.accepts(status) {
            return ActionOutcome::Completed;
        }

        let body = response.text().await.unwrap_or_default();
        ActionOutcome::Failed(format!(
            "{} {} returned {status}: {}",
            self.method,
            self.url,
            excerpt(&body, DEFAULT_EXCERPT_CHARS)
        ))
    }

    fn describe(&self) -> String {
        format!("http {} {}", self.method, self.url)
    }
}
