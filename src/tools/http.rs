//! Shared HTTP plumbing for the tool functions.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::config::ToolsConfig;
use crate::error::{AgentError, Result, ToolError};
use crate::tool::ToolName;

const AGENT_USER_AGENT: &str = concat!("wizard-agent/", env!("CARGO_PKG_VERSION"));

/// One reqwest client shared by all tools, plus the upstream base URLs.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: ToolsConfig,
}

impl UpstreamClient {
    pub fn new(config: &ToolsConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(AGENT_USER_AGENT));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|err| AgentError::ConfigurationInvalid(format!("http client error: {err}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    /// Joins a base URL from the tool configuration with a fixed path.
    pub fn url(&self, base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Performs exactly one GET and decodes the body as JSON. Transport
    /// errors, timeouts, non-2xx statuses and undecodable bodies all map to
    /// `UpstreamUnavailable`.
    pub async fn get_json(
        &self,
        tool: ToolName,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, ToolError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| {
                let message = if err.is_timeout() {
                    format!("request timed out after {}s", self.config.timeout_secs)
                } else {
                    format!("request failed: {err}")
                };
                ToolError::upstream(tool.as_str(), message)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ToolError::upstream(
                tool.as_str(),
                format!("HTTP {status}: {snippet}"),
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| ToolError::upstream(tool.as_str(), format!("malformed body: {err}")))
    }
}

/// Field lookup that reports a shape mismatch as an upstream failure.
pub(crate) fn require<'a>(
    tool: ToolName,
    value: &'a Value,
    pointer: &str,
) -> std::result::Result<&'a Value, ToolError> {
    value
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            ToolError::upstream(tool.as_str(), format!("response is missing `{pointer}`"))
        })
}
