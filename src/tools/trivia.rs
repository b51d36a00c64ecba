//! Multiple-choice questions from the Open Trivia Database.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::tool::{Tool, ToolName, ToolSchema};
use crate::tools::http::{require, UpstreamClient};

pub struct TriviaTool {
    client: UpstreamClient,
}

impl TriviaTool {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

/// Fields are requested RFC 3986 encoded so no HTML entities leak through.
fn decode(value: &Value) -> Result<String, ToolError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ToolError::upstream("trivia", "expected a string field"))?;
    urlencoding::decode(raw)
        .map(|text| text.into_owned())
        .map_err(|err| ToolError::upstream("trivia", format!("undecodable field: {err}")))
}

#[async_trait]
impl Tool for TriviaTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            ToolName::Trivia,
            "Get a random multiple-choice trivia question from Open Trivia Database. Returns question, correct answer, and incorrect answers.",
            Vec::new(),
        )
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let url = self.client.url(&self.client.config().trivia_url, "/api.php");
        let body = self
            .client
            .get_json(
                ToolName::Trivia,
                &url,
                &[
                    ("amount", "1".to_string()),
                    ("type", "multiple".to_string()),
                    ("encode", "url3986".to_string()),
                ],
            )
            .await?;

        let code = body["response_code"].as_i64().unwrap_or(0);
        if code != 0 {
            return Err(ToolError::upstream(
                "trivia",
                format!("Open Trivia DB response code {code}"),
            ));
        }
        let question = body["results"]
            .as_array()
            .and_then(|results| results.first())
            .ok_or_else(|| ToolError::upstream("trivia", "no trivia"))?;

        let incorrect = require(ToolName::Trivia, question, "/incorrect_answers")?
            .as_array()
            .ok_or_else(|| ToolError::upstream("trivia", "incorrect_answers is not a list"))?
            .iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({
            "category": decode(require(ToolName::Trivia, question, "/category")?)?,
            "difficulty": decode(require(ToolName::Trivia, question, "/difficulty")?)?,
            "question": decode(require(ToolName::Trivia, question, "/question")?)?,
            "correct_answer": decode(require(ToolName::Trivia, question, "/correct_answer")?)?,
            "incorrect_answers": incorrect,
        }))
    }
}
