use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://litellm-api.predev.praveg.ai/v1";
pub const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "deepinfra/Qwen/Qwen2.5-72B-Instruct";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Provider {
    /// Any OpenAI-compatible chat completions endpoint (LiteLLM, vLLM, ...).
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl Provider {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenAi => DEFAULT_OPENAI_ENDPOINT,
            Provider::Anthropic => DEFAULT_ANTHROPIC_ENDPOINT,
        }
    }

    /// Anthropic's Messages API rejects temperatures above 1.
    pub fn max_temperature(&self) -> f64 {
        match self {
            Provider::OpenAi => 2.0,
            Provider::Anthropic => 1.0,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => DEFAULT_MODEL,
            Provider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

impl FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "litellm" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(AgentError::ConfigurationInvalid(format!(
                "unknown provider `{other}` (expected `openai` or `anthropic`)"
            ))),
        }
    }
}

/// API key wrapper that never prints its contents.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    #[serde(default = "default_books_url")]
    pub books_url: String,
    #[serde(default = "default_joke_url")]
    pub joke_url: String,
    #[serde(default = "default_dog_url")]
    pub dog_url: String,
    #[serde(default = "default_trivia_url")]
    pub trivia_url: String,
}

impl ToolsConfig {
    /// Points every tool at the same base URL, used by local fakes.
    pub fn with_base_url(base: &str) -> Self {
        Self {
            weather_url: base.to_string(),
            books_url: base.to_string(),
            joke_url: base.to_string(),
            dog_url: base.to_string(),
            trivia_url: base.to_string(),
            ..Self::default()
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            weather_url: default_weather_url(),
            books_url: default_books_url(),
            joke_url: default_joke_url(),
            dog_url: default_dog_url(),
            trivia_url: default_trivia_url(),
        }
    }
}

fn default_tool_timeout() -> u64 {
    20
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com".into()
}

fn default_books_url() -> String {
    "https://www.googleapis.com".into()
}

fn default_joke_url() -> String {
    "https://v2.jokeapi.dev".into()
}

fn default_dog_url() -> String {
    "https://dog.ceo".into()
}

fn default_trivia_url() -> String {
    "https://opentdb.com".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

/// Unvalidated configuration as read from a TOML file and the environment.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<Credential>,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub parallel_tools: Option<bool>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|err| {
            AgentError::ConfigurationInvalid(format!("{key}=`{raw}` is not valid: {err}"))
        }),
        None => Ok(None),
    }
}

impl RawConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| {
            AgentError::ConfigurationInvalid(format!("failed to parse configuration: {err}"))
        })
    }

    /// Applies `WIZARD_*` overrides read through `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(endpoint) = lookup("WIZARD_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(provider) = parse_var::<Provider>(&lookup, "WIZARD_PROVIDER")? {
            self.provider = Some(provider);
        }
        let provider = self.provider.unwrap_or_default();
        let vendor_key = match provider {
            Provider::OpenAi => "DEEPINFRA_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        };
        if let Some(key) = lookup("WIZARD_API_KEY").or_else(|| lookup(vendor_key)) {
            self.api_key = Some(Credential(key));
        }
        if let Some(model) = lookup("WIZARD_MODEL") {
            self.model = Some(model);
        }
        if let Some(temperature) = parse_var(&lookup, "WIZARD_TEMPERATURE")? {
            self.temperature = Some(temperature);
        }
        if let Some(max_tokens) = parse_var(&lookup, "WIZARD_MAX_TOKENS")? {
            self.max_tokens = Some(max_tokens);
        }
        if let Some(max_iterations) = parse_var(&lookup, "WIZARD_MAX_ITERATIONS")? {
            self.max_iterations = Some(max_iterations);
        }
        if let Some(parallel) = parse_var(&lookup, "WIZARD_PARALLEL_TOOLS")? {
            self.parallel_tools = Some(parallel);
        }
        if let Some(timeout) = parse_var(&lookup, "WIZARD_TOOL_TIMEOUT_SECS")? {
            self.tools.timeout_secs = timeout;
        }
        if let Some(host) = lookup("WIZARD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "WIZARD_PORT")? {
            self.server.port = port;
        }
        Ok(self)
    }

    pub fn validate(self) -> Result<AgentConfig> {
        let credential = self
            .api_key
            .map(|key| key.0.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Credential)
            .ok_or_else(|| {
                AgentError::ConfigurationInvalid(
                    "missing API key; set WIZARD_API_KEY (or DEEPINFRA_API_KEY / ANTHROPIC_API_KEY)"
                        .into(),
                )
            })?;

        let provider = self.provider.unwrap_or_default();
        let temperature = self.temperature.unwrap_or(0.7);
        let max_temperature = provider.max_temperature();
        if !(0.0..=max_temperature).contains(&temperature) {
            return Err(AgentError::ConfigurationInvalid(format!(
                "temperature must be within [0, {max_temperature}] for {provider:?}, got {temperature}"
            )));
        }

        let max_iterations = self.max_iterations.unwrap_or(10);
        if max_iterations == 0 {
            return Err(AgentError::ConfigurationInvalid(
                "max_iterations must be at least 1".into(),
            ));
        }

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| provider.default_endpoint().to_string());
        reqwest::Url::parse(&endpoint).map_err(|err| {
            AgentError::ConfigurationInvalid(format!("endpoint `{endpoint}` is not a URL: {err}"))
        })?;

        Ok(AgentConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
            provider,
            model: self
                .model
                .unwrap_or_else(|| provider.default_model().to_string()),
            temperature,
            max_tokens: self.max_tokens.unwrap_or(4096),
            max_iterations,
            parallel_tools: self.parallel_tools.unwrap_or(false),
            system_prompt: self.system_prompt,
            tools: self.tools,
            server: self.server,
        })
    }
}

/// Validated, read-only settings shared by the agent, model client and tools.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub endpoint: String,
    pub credential: Credential,
    pub provider: Provider,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_iterations: usize,
    pub parallel_tools: bool,
    pub system_prompt: Option<String>,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
}

impl AgentConfig {
    /// Defaults everywhere except the credential.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        RawConfig {
            api_key: Some(Credential::new(api_key)),
            ..RawConfig::default()
        }
        .validate()
    }

    /// Process environment first, then entries of a `.env` file in the
    /// working directory or one of its parents. A missing `.env` is fine.
    pub fn from_env() -> Result<Self> {
        let dotenv = dotenv_entries(dotenvy::dotenv_iter())?;
        Self::from_lookup(|key| env::var(key).ok().or_else(|| dotenv.get(key).cloned()))
    }

    /// Reads the file named by `WIZARD_CONFIG` if set, then environment
    /// overrides.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = match lookup("WIZARD_CONFIG") {
            Some(path) => RawConfig::from_file(path)?,
            None => RawConfig::default(),
        };
        base.apply_env(lookup)?.validate()
    }

}

fn dotenv_entries(
    found: dotenvy::Result<dotenvy::Iter<fs::File>>,
) -> Result<HashMap<String, String>> {
    let invalid =
        |err: dotenvy::Error| AgentError::ConfigurationInvalid(format!("failed to read .env: {err}"));
    match found {
        Ok(entries) => entries
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(invalid),
        Err(err) if err.not_found() => Ok(HashMap::new()),
        Err(err) => Err(invalid(err)),
    }
}
