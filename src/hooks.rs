use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::message::{ToolCall, ToolResult};

/// Progress of a single run, in the order it happens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        run_id: String,
        input: String,
    },
    ModelRequested {
        run_id: String,
        iteration: usize,
    },
    ToolRequested {
        run_id: String,
        iteration: usize,
        call: ToolCall,
    },
    ToolCompleted {
        run_id: String,
        iteration: usize,
        result: ToolResult,
    },
    RunFinished {
        run_id: String,
        iterations: usize,
        answer: String,
    },
    RunFailed {
        run_id: String,
        kind: String,
        error: String,
    },
}

#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn on_event(&self, event: &AgentEvent);
}

/// Fans events out as JSON lines to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastHook {
    sender: broadcast::Sender<String>,
}

impl BroadcastHook {
    pub fn new(sender: broadcast::Sender<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AgentHook for BroadcastHook {
    async fn on_event(&self, event: &AgentEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            // No subscribers is fine.
            let _ = self.sender.send(line);
        }
    }
}
