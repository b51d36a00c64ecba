//! Language model clients and the schema dialects they speak.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::{AgentConfig, Provider};
use crate::error::{AgentError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolSchema;

const MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelCompletion>;
}

/// Builds the client matching the configured provider.
pub fn from_config(cfg: &AgentConfig) -> Result<Arc<dyn LanguageModel>> {
    Ok(match cfg.provider {
        Provider::OpenAi => Arc::new(OpenAiClient::from_config(cfg)?),
        Provider::Anthropic => Arc::new(AnthropicClient::from_config(cfg)?),
    })
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(MODEL_TIMEOUT)
        .build()
        .map_err(|err| AgentError::ConfigurationInvalid(format!("http client error: {err}")))
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::ModelUnavailable(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::ModelUnavailable(format!("{provider} request failed with {status}: {body}"))
}

fn fallback_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Arguments arrive as a JSON string; an empty string means no arguments.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions (function-wrapped tool dialect)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn from_config(cfg: &AgentConfig) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.credential.expose().to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }
}

/// Renders schemas as `{"type": "function", "function": {...}}` entries.
pub fn openai_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            serde_json::to_value(OpenAiTool {
                r#type: "function".to_string(),
                function: OpenAiFunction {
                    name: tool.name.as_str().to_string(),
                    description: tool.description.clone(),
                    parameters: tool.parameters_json(),
                },
            })
            .unwrap_or(Value::Null)
        })
        .collect()
}

fn to_openai_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
    messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string();

            let tool_calls: Option<Vec<OpenAiToolCall>> =
                (!message.tool_calls.is_empty()).then(|| {
                    message
                        .tool_calls
                        .iter()
                        .map(|call| OpenAiToolCall {
                            id: Some(call.id.clone()),
                            r#type: "function".to_string(),
                            function: OpenAiFunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect()
                });

            let content = match (&message.tool_result, message.content.is_empty()) {
                (Some(result), _) => Some(result.output.to_string()),
                (None, true) if tool_calls.is_some() => None,
                (None, _) => Some(message.content.clone()),
            };

            OpenAiMessage {
                role,
                content,
                tool_call_id: message.tool_result.as_ref().map(|r| r.tool_call_id.clone()),
                name: message.tool_result.as_ref().map(|r| r.name.clone()),
                tool_calls,
            }
        })
        .collect()
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelCompletion> {
        let mut payload = json!({
            "model": self.model,
            "messages": to_openai_messages(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(openai_tools(tools));
            payload["tool_choice"] = json!("auto");
        }

        debug!(model = %self.model, messages = messages.len(), "sending chat completion");
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AgentError::ModelUnavailable(format!("openai request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            AgentError::ModelUnavailable(format!("openai response parse error: {err}"))
        })?;
        let first = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::ModelUnavailable("openai returned no choices".into()))?;

        let tool_calls = first
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id.filter(|id| !id.is_empty()).unwrap_or_else(fallback_call_id),
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();

        Ok(ModelCompletion {
            content: first.message.content.filter(|c| !c.is_empty()),
            tool_calls,
        })
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages API (directly nested tool dialect)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_config(cfg: &AgentConfig) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.credential.expose().to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }
}

/// Renders schemas as `{"name", "description", "input_schema"}` entries.
pub fn anthropic_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            serde_json::to_value(AnthropicTool {
                name: tool.name.as_str().to_string(),
                description: tool.description.clone(),
                input_schema: tool.parameters_json(),
            })
            .unwrap_or(Value::Null)
        })
        .collect()
}

/// System text goes in its own field; tool results travel as `user` turns and
/// consecutive results are merged into one turn.
fn to_anthropic_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut built: Vec<AnthropicMessage> = Vec::new();
    for message in messages {
        match message.role {
            Role::System => {}
            Role::User => built.push(AnthropicMessage {
                role: "user".into(),
                content: vec![AnthropicBlock::Text {
                    text: message.content.clone(),
                }],
            }),
            Role::Assistant => {
                let mut content = Vec::new();
                if !message.content.is_empty() {
                    content.push(AnthropicBlock::Text {
                        text: message.content.clone(),
                    });
                }
                content.extend(message.tool_calls.iter().map(|call| AnthropicBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }));
                built.push(AnthropicMessage {
                    role: "assistant".into(),
                    content,
                });
            }
            Role::Tool => {
                let Some(result) = &message.tool_result else {
                    continue;
                };
                let block = AnthropicBlock::ToolResult {
                    tool_use_id: result.tool_call_id.clone(),
                    content: result.output.to_string(),
                    is_error: result.is_error().then_some(true),
                };
                match built.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && last
                                .content
                                .iter()
                                .all(|b| matches!(b, AnthropicBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block)
                    }
                    _ => built.push(AnthropicMessage {
                        role: "user".into(),
                        content: vec![block],
                    }),
                }
            }
        }
    }
    built
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelCompletion> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());
        let mut payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": to_anthropic_messages(messages),
        });
        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = Value::Array(anthropic_tools(tools));
        }

        debug!(model = %self.model, messages = messages.len(), "sending messages request");
        let resp = self
            .http
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                AgentError::ModelUnavailable(format!("anthropic request error: {err}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "anthropic"));
        }

        let body: AnthropicResponse = resp.json().await.map_err(|err| {
            AgentError::ModelUnavailable(format!("anthropic response parse error: {err}"))
        })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in body.content {
            match block {
                AnthropicBlock::Text { text: chunk } => text.push_str(&chunk),
                AnthropicBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id: if id.is_empty() { fallback_call_id() } else { id },
                    name,
                    arguments: input,
                }),
                AnthropicBlock::ToolResult { .. } | AnthropicBlock::Other => {}
            }
        }

        Ok(ModelCompletion {
            content: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted model
// ---------------------------------------------------------------------------

/// A deterministic model used for tests and offline demos. Replays the given
/// completions in order and records every transcript it was sent.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelCompletion>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelCompletion>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transcripts received so far, one entry per model call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete_chat(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<ModelCompletion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let mut locked = self
            .responses
            .lock()
            .map_err(|_| AgentError::ModelUnavailable("scripted model poisoned".into()))?;
        locked.pop_front().ok_or_else(|| {
            AgentError::ModelUnavailable("scripted model ran out of responses".into())
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default = "function_type")]
    r#type: String,
    function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Block kinds the agent does not use (thinking, images, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolResult;
    use crate::tool::{ParamKind, ParamSpec, ToolName};

    fn weather_schema() -> ToolSchema {
        ToolSchema::new(
            ToolName::GetWeather,
            "Weather",
            vec![
                ParamSpec::required("latitude", ParamKind::Number, "lat"),
                ParamSpec::required("longitude", ParamKind::Number, "lon"),
            ],
        )
    }

    fn conversation() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::user("weather?"),
            Message::assistant_with_calls(
                None,
                vec![
                    ToolCall::new("a", "get_weather", json!({"latitude": 1.0, "longitude": 2.0})),
                    ToolCall::new("b", "random_joke", json!({})),
                ],
            ),
            Message::tool(ToolResult {
                tool_call_id: "a".into(),
                name: "get_weather".into(),
                output: json!({"temperature": 20.5}),
            }),
            Message::tool(ToolResult {
                tool_call_id: "b".into(),
                name: "random_joke".into(),
                output: json!({"error": "boom"}),
            }),
        ]
    }

    #[test]
    fn both_dialects_share_one_schema() {
        let schemas = [weather_schema()];
        let openai = openai_tools(&schemas);
        let anthropic = anthropic_tools(&schemas);

        assert_eq!(openai[0]["type"], "function");
        assert_eq!(openai[0]["function"]["name"], "get_weather");
        assert_eq!(anthropic[0]["name"], "get_weather");
        assert_eq!(openai[0]["function"]["parameters"], anthropic[0]["input_schema"]);
    }

    #[test]
    fn openai_messages_carry_call_ids() {
        let wire = serde_json::to_value(to_openai_messages(&conversation())).unwrap();

        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[2]["content"], Value::Null);
        assert_eq!(wire[2]["tool_calls"][0]["id"], "a");
        assert_eq!(wire[2]["tool_calls"][1]["function"]["arguments"], "{}");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "a");
        assert_eq!(wire[4]["tool_call_id"], "b");
    }

    #[test]
    fn anthropic_merges_tool_results_into_one_user_turn() {
        let wire = to_anthropic_messages(&conversation());

        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1].role, "assistant");
        assert_eq!(wire[2].role, "user");
        assert_eq!(wire[2].content.len(), 2);
        let json = serde_json::to_value(&wire[2]).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][1]["is_error"], true);
    }

    #[test]
    fn parses_empty_and_broken_arguments() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"topic\":\"mystery\"}"), json!({"topic": "mystery"}));
        assert_eq!(parse_arguments("{oops"), json!("{oops"));
    }

    #[tokio::test]
    async fn scripted_model_replays_then_fails() {
        let model = ScriptedModel::new(vec![ModelCompletion::text("hello")]);

        let first = model.complete_chat(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("hello"));

        let err = model.complete_chat(&[], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable(_)));
        assert_eq!(model.requests().len(), 2);
    }
}
