//! Random dog pictures from the Dog CEO API.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::tool::{Tool, ToolName, ToolSchema};
use crate::tools::http::{require, UpstreamClient};

pub struct RandomDogTool {
    client: UpstreamClient,
}

impl RandomDogTool {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

/// Image URLs look like `.../breeds/<breed>[-<sub>]/<file>.jpg`.
fn breed_from_url(url: &str) -> Option<String> {
    let mut segments = url.split('/');
    segments.find(|s| *s == "breeds")?;
    let raw = segments.next().filter(|s| !s.is_empty())?;
    let mut parts: Vec<&str> = raw.split('-').collect();
    parts.reverse();
    Some(parts.join(" "))
}

#[async_trait]
impl Tool for RandomDogTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            ToolName::RandomDog,
            "Get a random dog image URL from Dog CEO API. Returns an image URL.",
            Vec::new(),
        )
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let url = self
            .client
            .url(&self.client.config().dog_url, "/api/breeds/image/random");
        let body = self
            .client
            .get_json(ToolName::RandomDog, &url, &[])
            .await?;

        if body["status"].as_str() != Some("success") {
            return Err(ToolError::upstream(
                "random_dog",
                format!("unexpected status `{}`", body["status"]),
            ));
        }
        let image_url = require(ToolName::RandomDog, &body, "/message")?
            .as_str()
            .ok_or_else(|| ToolError::upstream("random_dog", "image URL is not a string"))?;

        Ok(json!({
            "image_url": image_url,
            "breed": breed_from_url(image_url),
        }))
    }
}
