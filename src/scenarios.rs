//! Canned user requests with the tools each one should trigger, run against a
//! live agent as a smoke test.

use serde::Serialize;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::tool::ToolName;

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub input: &'static str,
    pub expected_tools: &'static [ToolName],
    pub description: &'static str,
}

pub const SCENARIOS: [Scenario; 5] = [
    Scenario {
        name: "Weather Query",
        input: "What's the weather in New York at coordinates 40.7128, -74.0060?",
        expected_tools: &[ToolName::GetWeather],
        description: "Basic weather tool calling with coordinate parsing",
    },
    Scenario {
        name: "Book Recommendations",
        input: "Recommend 3 mystery books for me",
        expected_tools: &[ToolName::BookRecs],
        description: "Book recommendation tool with topic and limit",
    },
    Scenario {
        name: "Entertainment Package",
        input: "Tell me a joke and show me a dog picture",
        expected_tools: &[ToolName::RandomJoke, ToolName::RandomDog],
        description: "Multiple simple tools in one request",
    },
    Scenario {
        name: "Complex Multi-Tool Request",
        input: "Plan a Saturday in Paris at (48.8566, 2.3522). Get the weather, recommend 2 science fiction books, and give me a trivia question.",
        expected_tools: &[ToolName::GetWeather, ToolName::BookRecs, ToolName::Trivia],
        description: "Several tools planned from one request",
    },
    Scenario {
        name: "Trivia Question",
        input: "Give me a trivia question",
        expected_tools: &[ToolName::Trivia],
        description: "Trivia tool calling",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub passed: bool,
    pub called_tools: Vec<String>,
    pub missing_tools: Vec<String>,
    pub answer: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// A scenario passes when the run ends with an answer and every expected tool
/// was called at least once.
pub async fn run_scenario(agent: &Agent, scenario: &Scenario) -> ScenarioOutcome {
    match agent.run(scenario.input).await {
        Ok(run) => {
            let called_tools: Vec<String> =
                run.tool_calls().iter().map(|c| c.name.clone()).collect();
            let missing_tools: Vec<String> = scenario
                .expected_tools
                .iter()
                .filter(|tool| !called_tools.iter().any(|c| c == tool.as_str()))
                .map(|tool| tool.to_string())
                .collect();
            ScenarioOutcome {
                name: scenario.name.to_string(),
                passed: missing_tools.is_empty(),
                called_tools,
                missing_tools,
                answer: Some(run.answer),
                error: None,
            }
        }
        Err(err) => ScenarioOutcome {
            name: scenario.name.to_string(),
            passed: false,
            called_tools: Vec::new(),
            missing_tools: scenario.expected_tools.iter().map(|t| t.to_string()).collect(),
            answer: None,
            error: Some(err.to_string()),
        },
    }
}

pub async fn run_scenarios(agent: &Agent, scenarios: &[Scenario]) -> ScenarioReport {
    let mut report = ScenarioReport::default();
    for scenario in scenarios {
        let outcome = run_scenario(agent, scenario).await;
        if outcome.passed {
            info!(scenario = scenario.name, "scenario passed");
        } else {
            warn!(scenario = scenario.name, missing = ?outcome.missing_tools, error = ?outcome.error, "scenario failed");
        }
        report.outcomes.push(outcome);
    }
    report
}
