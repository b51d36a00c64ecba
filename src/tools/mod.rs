//! The five read-only tools the agent can call.
//!
//! Each tool performs a single HTTPS GET against a public, unauthenticated
//! API and extracts a handful of fields:
//! - `get_weather`: Open-Meteo current conditions
//! - `book_recs`: Google Books volume search
//! - `random_joke`: JokeAPI
//! - `random_dog`: Dog CEO
//! - `trivia`: Open Trivia Database

pub mod books;
pub mod dog;
pub mod http;
pub mod joke;
pub mod trivia;
pub mod weather;

pub use books::BookRecsTool;
pub use dog::RandomDogTool;
pub use http::UpstreamClient;
pub use joke::RandomJokeTool;
pub use trivia::TriviaTool;
pub use weather::WeatherTool;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::tool::ToolRegistry;

/// Registry with all five tools, in the order their schemas are sent.
pub fn standard_toolkit(config: &ToolsConfig) -> Result<ToolRegistry> {
    let client = UpstreamClient::new(config)?;
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool::new(client.clone()));
    registry.register(BookRecsTool::new(client.clone()));
    registry.register(RandomJokeTool::new(client.clone()));
    registry.register(RandomDogTool::new(client.clone()));
    registry.register(TriviaTool::new(client));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolName;

    #[test]
    fn registers_all_tools_in_schema_order() {
        let registry = standard_toolkit(&ToolsConfig::default()).unwrap();
        let names: Vec<ToolName> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ToolName::ALL.to_vec());
    }
}
