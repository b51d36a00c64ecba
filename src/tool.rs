use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::{ToolCall, ToolResult};

/// The closed set of tools the agent can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    GetWeather,
    BookRecs,
    RandomJoke,
    RandomDog,
    Trivia,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::GetWeather,
        ToolName::BookRecs,
        ToolName::RandomJoke,
        ToolName::RandomDog,
        ToolName::Trivia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetWeather => "get_weather",
            ToolName::BookRecs => "book_recs",
            ToolName::RandomJoke => "random_joke",
            ToolName::RandomDog => "random_dog",
            ToolName::Trivia => "trivia",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Number,
    Integer,
    String,
    Boolean,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            ParamKind::String => value.is_string(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            default: Some(default),
        }
    }
}

/// Static declaration of a tool, sent to the model on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(name: ToolName, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name,
            description: description.into(),
            params,
        }
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_json(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = json!({
                "type": param.kind.json_type(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                prop["default"] = default.clone();
            }
            properties.insert(param.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = json!({ "type": "object", "properties": properties });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    /// Checks shape and primitive types, fills in defaults. Unknown keys are
    /// dropped.
    pub fn validate(&self, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
        let tool = self.name.as_str();
        let provided = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(ToolError::invalid(
                    tool,
                    format!("arguments must be an object, got `{other}`"),
                ))
            }
        };

        let mut validated = Map::new();
        for param in &self.params {
            match provided.get(&param.name) {
                Some(value) if !value.is_null() => {
                    if !param.kind.accepts(value) {
                        return Err(ToolError::invalid(
                            tool,
                            format!(
                                "`{}` must be of type {}, got `{value}`",
                                param.name,
                                param.kind.json_type()
                            ),
                        ));
                    }
                    validated.insert(param.name.clone(), value.clone());
                }
                _ if param.required => {
                    return Err(ToolError::invalid(
                        tool,
                        format!("missing required `{}`", param.name),
                    ))
                }
                _ => {
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(validated)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Runs the tool with arguments already checked against `schema()`.
    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;
}

/// Success payload or the error text shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutcome::Failure(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            ToolOutcome::Success(value) => value,
            ToolOutcome::Failure(error) => json!({ "error": error }),
        }
    }
}

struct Registered {
    name: ToolName,
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// Fixed, ordered mapping from tool name to implementation and schema.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<Registered>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Binds `tool` to the name its schema declares, replacing any previous
    /// binding in place so the schema order is preserved.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        let entry = Arc::new(Registered {
            name: schema.name,
            schema,
            tool: Arc::new(tool),
        });
        match self.tools.iter_mut().find(|t| t.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.tools.push(entry),
        }
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema.clone()).collect()
    }

    /// Looks up and runs a tool. Only an unknown name is an error; any failure
    /// of a known tool comes back as `ToolOutcome::Failure`.
    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolOutcome, ToolError> {
        let entry = name
            .parse::<ToolName>()
            .ok()
            .and_then(|parsed| self.tools.iter().find(|t| t.name == parsed))
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let result = match entry.schema.validate(arguments) {
            Ok(validated) => entry.tool.call(validated).await,
            Err(err) => Err(err),
        };

        Ok(match result {
            Ok(value) => {
                debug!(tool = name, "tool call succeeded");
                ToolOutcome::Success(value)
            }
            Err(err) => {
                warn!(tool = name, error = %err, "tool call failed");
                ToolOutcome::Failure(err.to_string())
            }
        })
    }

    /// Runs a model-issued call and always produces a result for its id.
    pub async fn execute_call(&self, call: &ToolCall) -> ToolResult {
        let outcome = match self.execute(&call.name, &call.arguments).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.id, "model requested an unknown tool");
                ToolOutcome::Failure(err.to_string())
            }
        };
        ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            output: outcome.into_value(),
        }
    }
}
