//! Tool selection strategies and the select, execute, synthesize pipeline.
//!
//! [`ModelSelector`] lets the model pick tools from the schema set;
//! [`KeywordSelector`] picks them with regular expressions and needs no model
//! call at all. Either one feeds an [`Orchestrator`], which runs every
//! selected tool once and asks the model for a single summarizing answer.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::AgentRun;
use crate::error::{AgentError, Result};
use crate::llm::LanguageModel;
use crate::message::{Message, ToolCall};
use crate::tool::{ToolName, ToolRegistry, ToolSchema};
use crate::tools::books::MAX_LIMIT;
use crate::transcript::Transcript;

const SYNTHESIS_PROMPT: &str =
    "You are a helpful assistant that creates friendly responses from tool results.";

const SELECTION_PROMPT: &str = "Decide which tools are needed to answer the user's request and call all of them. Do not answer the request yourself.";

const DEFAULT_BOOK_COUNT: i64 = 2;

const GENRES: [&str; 9] = [
    "mystery",
    "science fiction",
    "fantasy",
    "history",
    "romance",
    "horror",
    "thriller",
    "biography",
    "poetry",
];

static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\s*(-?\d+\.?\d*)\s*,\s*(-?\d+\.?\d*)\s*\)?").expect("valid regex")
});

static BOOK_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(?:[a-z-]+\s+){0,2}books?").expect("valid regex"));

#[async_trait]
pub trait ToolSelector: Send + Sync {
    /// Tool calls to make for `input`, in execution order.
    async fn select(&self, input: &str, tools: &[ToolSchema]) -> Result<Vec<ToolCall>>;

    /// Model calls spent per selection.
    fn model_calls(&self) -> usize {
        0
    }
}

/// Regex-driven selection: weather needs the word and a coordinate pair,
/// the other tools trigger on a keyword.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordSelector;

impl KeywordSelector {
    pub fn new() -> Self {
        Self
    }

    /// Picks tools without consulting any schema; weather, books, joke, dog,
    /// trivia in that order.
    pub fn pick(&self, input: &str) -> Vec<(ToolName, Value)> {
        let text = input.to_lowercase();
        let mut picks = Vec::new();

        if text.contains("weather") {
            if let Some((latitude, longitude)) = coordinates(&text) {
                picks.push((
                    ToolName::GetWeather,
                    json!({ "latitude": latitude, "longitude": longitude }),
                ));
            }
        }
        if text.contains("book") {
            let limit = BOOK_COUNT
                .captures(&text)
                .and_then(|caps| caps[1].parse::<i64>().ok())
                .unwrap_or(DEFAULT_BOOK_COUNT)
                .clamp(1, MAX_LIMIT);
            let topic = GENRES
                .iter()
                .find(|genre| text.contains(*genre))
                .copied()
                .unwrap_or("fiction");
            picks.push((ToolName::BookRecs, json!({ "topic": topic, "limit": limit })));
        }
        if text.contains("joke") {
            picks.push((ToolName::RandomJoke, json!({})));
        }
        if text.contains("dog") {
            picks.push((ToolName::RandomDog, json!({})));
        }
        if text.contains("trivia") || text.contains("question") {
            picks.push((ToolName::Trivia, json!({})));
        }
        picks
    }
}

fn coordinates(text: &str) -> Option<(f64, f64)> {
    let caps = COORDINATES.captures(text)?;
    let latitude = caps[1].parse().ok()?;
    let longitude = caps[2].parse().ok()?;
    Some((latitude, longitude))
}

#[async_trait]
impl ToolSelector for KeywordSelector {
    async fn select(&self, input: &str, tools: &[ToolSchema]) -> Result<Vec<ToolCall>> {
        Ok(self
            .pick(input)
            .into_iter()
            .filter(|(name, _)| tools.iter().any(|schema| schema.name == *name))
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall::new(format!("kw_{}", i + 1), name.as_str(), arguments))
            .collect())
    }
}

/// Asks the model once which tools to call.
pub struct ModelSelector {
    model: Arc<dyn LanguageModel>,
}

impl ModelSelector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ToolSelector for ModelSelector {
    async fn select(&self, input: &str, tools: &[ToolSchema]) -> Result<Vec<ToolCall>> {
        let transcript = Transcript::new(SELECTION_PROMPT, input);
        let completion = self.model.complete_chat(transcript.messages(), tools).await?;
        Ok(completion.tool_calls)
    }

    fn model_calls(&self) -> usize {
        1
    }
}

/// Select, execute each tool once, then one model call to write the answer.
pub struct Orchestrator {
    selector: Arc<dyn ToolSelector>,
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
}

impl Orchestrator {
    pub fn new(
        selector: Arc<dyn ToolSelector>,
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            selector,
            model,
            tools,
        }
    }

    pub fn keyword(model: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(Arc::new(KeywordSelector::new()), model, tools)
    }

    pub async fn run(&self, user_input: &str) -> Result<AgentRun> {
        let schemas = self.tools.schemas();
        let calls = self.selector.select(user_input, &schemas).await?;
        if calls.is_empty() {
            return Err(AgentError::NoToolsSelected);
        }
        info!(
            tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "tools selected"
        );

        let mut transcript = Transcript::new(SYNTHESIS_PROMPT, user_input);
        transcript.push(Message::assistant_with_calls(None, calls.clone()));
        let mut findings = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = self.tools.execute_call(call).await;
            debug!(tool = %call.name, call_id = %call.id, failed = result.is_error(), "tool finished");
            findings.push(format!("- {}: {}", result.name, result.output));
            transcript.push(Message::tool(result));
        }

        let prompt = format!(
            "User asked: {user_input}\n\nTool results:\n{}\n\n\
             Create a friendly, complete response incorporating all the information above. \
             Format weather in Celsius and Fahrenheit. Present book titles with authors. \
             Make it conversational and helpful.",
            findings.join("\n")
        );
        let request = Transcript::new(SYNTHESIS_PROMPT, prompt);
        let completion = self.model.complete_chat(request.messages(), &[]).await?;
        let answer = completion
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AgentError::ModelUnavailable("model returned an empty answer".into()))?;

        transcript.push(Message::assistant(answer.clone()));
        Ok(AgentRun {
            run_id: Uuid::new_v4().to_string(),
            answer,
            iterations: self.selector.model_calls() + 1,
            transcript,
        })
    }
}
