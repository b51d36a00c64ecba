//! Safe single-line jokes from JokeAPI.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::tool::{Tool, ToolName, ToolSchema};
use crate::tools::http::UpstreamClient;

pub struct RandomJokeTool {
    client: UpstreamClient,
}

impl RandomJokeTool {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for RandomJokeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            ToolName::RandomJoke,
            "Get a random safe joke from JokeAPI. Returns a single joke string.",
            Vec::new(),
        )
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let url = self.client.url(&self.client.config().joke_url, "/joke/Any");
        let body = self
            .client
            .get_json(
                ToolName::RandomJoke,
                &url,
                &[("type", "single".to_string()), ("safe-mode", String::new())],
            )
            .await?;

        if body["error"].as_bool() == Some(true) {
            let message = body["message"].as_str().unwrap_or("JokeAPI reported an error");
            return Err(ToolError::upstream("random_joke", message));
        }
        let joke = body["joke"].as_str().unwrap_or("No joke found");
        Ok(json!({ "joke": joke }))
    }
}
