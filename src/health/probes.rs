//! # Built-in Probes
//!
//! HTTP, TCP and command probes. Each maps "service not there yet" to
//! `NotReady` and "this probe can never succeed as written" to `Error`, so
//! the verifier can stop polling a misconfigured probe early.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;

use super::probe::{Probe, ProbeStatus};
use crate::error::{Result, StagehandError};
use crate::utils::text::{excerpt, tail_excerpt, DEFAULT_EXCERPT_CHARS};

/// Turn `status.ready` style paths into JSON pointers, leaving pointers as-is
pub fn normalize_json_pointer(field: &str) -> String {
    if field.is_empty() || field.starts_with('/') {
        field.to_string()
    } else {
        format!("/{}", field.replace('.', "/"))
    }
}

/// GET an endpoint and check its status code and, optionally, a JSON field
#[derive(Debug, Clone)]
pub struct HttpProbe {
    id: String,
    client: Client,
    url: Url,
    expect_status: Vec<u16>,
    json_pointer: Option<String>,
    expect_value: Option<serde_json::Value>,
    headers: Vec<(String, String)>,
}

impl HttpProbe {
    pub fn new(id: impl Into<String>, url: &str, request_timeout: Duration) -> Result<Self> {
        let id = id.into();
        let parsed = Url::parse(url).map_err(|e| {
            StagehandError::InvalidDefinition(format!("probe '{id}': invalid url '{url}': {e}"))
        })?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                StagehandError::ConfigurationError(format!("probe '{id}': HTTP client: {e}"))
            })?;

        Ok(Self {
            id,
            client,
            url: parsed,
            expect_status: Vec::new(),
            json_pointer: None,
            expect_value: None,
            headers: Vec::new(),
        })
    }

    /// Accepted status codes; empty accepts any 2xx
    pub fn expect_status(mut self, codes: Vec<u16>) -> Self {
        self.expect_status = codes;
        self
    }

    /// Require `field` in the JSON body, optionally equal to `value`
    pub fn expect_json(mut self, field: &str, value: Option<serde_json::Value>) -> Self {
        self.json_pointer = Some(normalize_json_pointer(field));
        self.expect_value = value;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn status_matches(&self, status: StatusCode) -> bool {
        if self.expect_status.is_empty() {
            status.is_success()
        } else {
            self.expect_status.contains(&status.as_u16())
        }
    }

    /// Check a response body against the configured JSON expectation
    pub fn evaluate_body(&self, body: &[u8]) -> ProbeStatus {
        let Some(pointer) = &self.json_pointer else {
            return ProbeStatus::Ready;
        };

        let document: serde_json::Value = match serde_json::from_slice(body) {
            Ok(document) => document,
            Err(e) => {
                let text = String::from_utf8_lossy(body);
                return ProbeStatus::Error(format!(
                    "response body is not JSON ({e}): {}",
                    excerpt(&text, DEFAULT_EXCERPT_CHARS)
                ));
            }
        };

        // A service that is still starting may answer with a partial payload
        match (document.pointer(pointer), &self.expect_value) {
            (None, _) => ProbeStatus::NotReady(format!("field '{pointer}' missing from response")),
            (Some(_), None) => ProbeStatus::Ready,
            (Some(actual), Some(expected)) if actual == expected => ProbeStatus::Ready,
            (Some(actual), Some(expected)) => ProbeStatus::NotReady(format!(
                "field '{pointer}' is {actual}, expected {expected}"
            )),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn id(&self) -> &str {
        &self.id
    }

    async fn check(&self) -> ProbeStatus {
        let mut request = self.client.get(self.url.clone());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return ProbeStatus::Error(format!("cannot build request: {e}"));
            }
            Err(e) => return ProbeStatus::NotReady(format!("request failed: {e}")),
        };

        let status = response.status();
        if !self.status_matches(status) {
            return ProbeStatus::NotReady(format!("unexpected status {status}"));
        }

        if self.json_pointer.is_none() {
            return ProbeStatus::Ready;
        }

        match response.bytes().await {
            Ok(body) => self.evaluate_body(&body),
            Err(e) => ProbeStatus::NotReady(format!("failed to read response body: {e}")),
        }
    }
}

/// Ready as soon as a TCP connection is accepted
#[derive(Debug, Clone)]
pub struct TcpProbe {
    id: String,
    address: String,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(id: impl Into<String>, address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            connect_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn id(&self) -> &str {
        &self.id
    }

    async fn check(&self) -> ProbeStatus {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.address.as_str()))
            .await
        {
            Ok(Ok(_stream)) => ProbeStatus::Ready,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::InvalidInput => {
                ProbeStatus::Error(format!("invalid address '{}': {e}", self.address))
            }
            Ok(Err(e)) => ProbeStatus::NotReady(format!("connect to {} failed: {e}", self.address)),
            Err(_) => ProbeStatus::NotReady(format!(
                "connect to {} timed out after {:?}",
                self.address, self.connect_timeout
            )),
        }
    }
}

/// Ready when the command exits with status 0
#[derive(Debug, Clone)]
pub struct CommandProbe {
    id: String,
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn new(id: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: id.into(),
            program: program.into(),
            args,
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Probe for CommandProbe {
    fn id(&self) -> &str {
        &self.id
    }

    async fn check(&self) -> ProbeStatus {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Err(e) => ProbeStatus::Error(format!("failed to run '{}': {e}", self.program)),
            Ok(output) if output.status.success() => ProbeStatus::Ready,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let text = if stderr.trim().is_empty() { stdout } else { stderr };
                ProbeStatus::NotReady(format!(
                    "'{}' exited with {}: {}",
                    self.command_line(),
                    output.status,
                    tail_excerpt(&text, DEFAULT_EXCERPT_CHARS)
                ))
            }
        }
    }
}
