use thiserror::Error;

use crate::transcript::Transcript;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Failures that escape a run and are visible to the caller.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("model endpoint unavailable: {0}")]
    ModelUnavailable(String),

    #[error("no final answer after {max_iterations} model calls")]
    IterationExhausted {
        max_iterations: usize,
        /// Last assistant text seen before the cap was hit, if any.
        partial: Option<String>,
    },

    #[error("run cancelled after {iterations} model calls")]
    Cancelled {
        iterations: usize,
        transcript: Box<Transcript>,
    },

    #[error("no tools matched the request; mention weather, books, a joke, a dog or trivia")]
    NoToolsSelected,

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    /// Stable machine-readable label, used by the web surface and the harness.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::ConfigurationInvalid(_) => "configuration_invalid",
            AgentError::ModelUnavailable(_) => "model_unavailable",
            AgentError::IterationExhausted { .. } => "iteration_exhausted",
            AgentError::Cancelled { .. } => "cancelled",
            AgentError::NoToolsSelected => "no_tools_selected",
            AgentError::Server(_) => "server",
            AgentError::Io(_) => "io",
            AgentError::Serde(_) => "serde",
        }
    }
}

/// Failures raised inside a single tool invocation.
///
/// These never leave the tool registry as errors for a known tool: they are
/// folded into an `{"error": ...}` result the model can reason about.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("invalid argument for `{tool}`: {message}")]
    InvalidArgument { tool: String, message: String },

    #[error("`{tool}` upstream unavailable: {message}")]
    UpstreamUnavailable { tool: String, message: String },

    #[error("unknown tool `{0}`")]
    UnknownTool(String),
}

impl ToolError {
    pub fn invalid(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn upstream(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::UpstreamUnavailable {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
