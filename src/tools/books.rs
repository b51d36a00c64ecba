//! Book recommendations from the Google Books volume search.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolName, ToolSchema};
use crate::tools::http::UpstreamClient;

pub const DEFAULT_LIMIT: i64 = 5;
pub const MAX_LIMIT: i64 = 10;

#[derive(Debug, Serialize, PartialEq)]
pub struct BookPick {
    pub title: String,
    pub author: String,
    pub year: String,
    pub id: Option<String>,
}

pub struct BookRecsTool {
    client: UpstreamClient,
}

impl BookRecsTool {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

fn pick_from(item: &Value) -> BookPick {
    let info = &item["volumeInfo"];
    BookPick {
        title: info["title"].as_str().unwrap_or("Untitled").to_string(),
        author: info["authors"]
            .as_array()
            .and_then(|authors| authors.first())
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        year: info["publishedDate"]
            .as_str()
            .filter(|date| !date.is_empty())
            .map(|date| date.chars().take(4).collect())
            .unwrap_or_else(|| "N/A".to_string()),
        id: item["id"].as_str().map(str::to_string),
    }
}

#[async_trait]
impl Tool for BookRecsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            ToolName::BookRecs,
            "Get book recommendations for a topic via Google Books API. Returns list of books with title, author, and year.",
            vec![
                ParamSpec::required(
                    "topic",
                    ParamKind::String,
                    "Search topic (e.g., 'mystery', 'science fiction', 'history')",
                ),
                ParamSpec::optional(
                    "limit",
                    ParamKind::Integer,
                    "Number of results to return (default: 5, max: 10)",
                    json!(DEFAULT_LIMIT),
                ),
            ],
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let topic = arguments
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::invalid("book_recs", "`topic` must be a non-empty string"))?
            .to_string();
        let limit = arguments
            .get("limit")
            .and_then(Value::as_f64)
            .map(|n| n as i64)
            .unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ToolError::invalid(
                "book_recs",
                format!("`limit` must be between 1 and {MAX_LIMIT}, got {limit}"),
            ));
        }

        let url = self
            .client
            .url(&self.client.config().books_url, "/books/v1/volumes");
        let body = self
            .client
            .get_json(
                ToolName::BookRecs,
                &url,
                &[("q", topic.clone()), ("maxResults", limit.to_string())],
            )
            .await?;

        if !body.is_object() {
            return Err(ToolError::upstream("book_recs", "expected a JSON object"));
        }
        let picks: Vec<BookPick> = body["items"]
            .as_array()
            .map(|items| items.iter().take(limit as usize).map(pick_from).collect())
            .unwrap_or_default();

        Ok(json!({ "topic": topic, "results": picks }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fields_with_fallbacks() {
        let full = json!({
            "id": "abc",
            "volumeInfo": {"title": "Gone Girl", "authors": ["Gillian Flynn", "X"], "publishedDate": "2012-06-05"}
        });
        assert_eq!(
            pick_from(&full),
            BookPick {
                title: "Gone Girl".into(),
                author: "Gillian Flynn".into(),
                year: "2012".into(),
                id: Some("abc".into()),
            }
        );

        let sparse = json!({"volumeInfo": {"title": "Anonymous"}});
        let pick = pick_from(&sparse);
        assert_eq!(pick.author, "Unknown");
        assert_eq!(pick.year, "N/A");
        assert_eq!(pick.id, None);
    }
}
