use serde::Serialize;
use serde_json::json;

use crate::message::{Message, Role, ToolCall, ToolResult};

/// Ordered message history of a single agent run.
#[derive(Default, Clone, Debug, PartialEq, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_input)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Every tool call the model requested, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.messages.iter().flat_map(|m| m.tool_calls.iter())
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.messages.iter().filter_map(|m| m.tool_result.as_ref())
    }

    /// Calls from the latest assistant turn that have no tool message yet.
    pub fn unanswered_calls(&self) -> Vec<&ToolCall> {
        let Some(turn) = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant && !m.tool_calls.is_empty())
        else {
            return Vec::new();
        };
        let answered: Vec<&str> = self.messages[turn + 1..]
            .iter()
            .filter_map(|m| m.tool_result.as_ref())
            .map(|r| r.tool_call_id.as_str())
            .collect();
        self.messages[turn]
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(&call.id.as_str()))
            .collect()
    }

    /// Answers every pending call with an error result so the transcript can
    /// be replayed to a model without dangling requests.
    pub fn seal_unanswered(&mut self, reason: &str) -> usize {
        let pending: Vec<ToolCall> = self.unanswered_calls().into_iter().cloned().collect();
        for call in &pending {
            self.messages.push(Message::tool(ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                output: json!({ "error": reason }),
            }));
        }
        pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "random_joke", json!({}))
    }

    #[test]
    fn starts_with_system_and_user() {
        let transcript = Transcript::new("be nice", "hi");
        let roles: Vec<Role> = transcript.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[test]
    fn tracks_unanswered_calls_of_latest_turn() {
        let mut transcript = Transcript::new("sys", "joke twice");
        transcript.push(Message::assistant_with_calls(None, vec![call("a"), call("b")]));
        transcript.push(Message::tool(ToolResult {
            tool_call_id: "a".into(),
            name: "random_joke".into(),
            output: json!({"joke": "..."}),
        }));

        let pending: Vec<&str> = transcript
            .unanswered_calls()
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(pending, vec!["b"]);
    }

    #[test]
    fn sealing_answers_everything_pending() {
        let mut transcript = Transcript::new("sys", "jokes");
        transcript.push(Message::assistant_with_calls(None, vec![call("a"), call("b")]));

        assert_eq!(transcript.seal_unanswered("cancelled"), 2);
        assert!(transcript.unanswered_calls().is_empty());
        assert!(transcript.tool_results().all(ToolResult::is_error));
        assert_eq!(transcript.seal_unanswered("cancelled"), 0);
    }
}
