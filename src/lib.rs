//! A small tool-calling agent.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with OpenAI-compatible and
//!   Anthropic clients, plus a scripted model for tests.
//! - Five read-only HTTP tools (weather, books, jokes, dog pictures, trivia)
//!   behind one `ToolRegistry`.
//! - An `Agent` that loops between the model and the tools until it has an
//!   answer, and an `Orchestrator` that selects tools up front.

mod agent;
mod config;
mod error;
mod hooks;
mod llm;
mod message;
mod selector;
#[cfg(feature = "server")]
mod server;
mod telemetry;
mod tool;
mod transcript;

pub mod scenarios;
pub mod tools;

pub use agent::{Agent, AgentRun, DEFAULT_SYSTEM_PROMPT};
pub use config::{AgentConfig, Credential, Provider, RawConfig, ServerConfig, ToolsConfig};
pub use error::{AgentError, Result, ToolError};
pub use hooks::{AgentEvent, AgentHook, BroadcastHook};
pub use llm::{
    anthropic_tools, from_config as model_from_config, openai_tools, AnthropicClient,
    LanguageModel, ModelCompletion, OpenAiClient, ScriptedModel,
};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use selector::{KeywordSelector, ModelSelector, Orchestrator, ToolSelector};
#[cfg(feature = "server")]
pub use server::{router, serve, AppState};
pub use telemetry::init_tracing;
pub use tool::{ParamKind, ParamSpec, Tool, ToolName, ToolOutcome, ToolRegistry, ToolSchema};
pub use tools::standard_toolkit;
pub use transcript::Transcript;

pub use tokio_util::sync::CancellationToken;
