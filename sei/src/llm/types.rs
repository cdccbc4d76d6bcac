//! LLM request types

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one chat call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt, always sent as the first message
    pub system_prompt: String,

    /// Conversation messages following the system prompt
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// A request carrying one user prompt under a system prompt
    pub fn single(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![Message::user(prompt)],
        }
    }

    /// Wire messages: the system prompt followed by the conversation
    pub fn wire_messages(&self) -> Vec<Message> {
        debug!(message_count = %self.messages.len(), "wire_messages: called");
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(self.messages.iter().cloned());
        messages
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages_start_with_system_prompt() {
        let request = CompletionRequest::single("Be helpful", "plan a party");
        let wire = request.wire_messages();

        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0], Message::system("Be helpful"));
        assert_eq!(wire[1], Message::user("plan a party"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Message::system("rules")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "rules");
        assert_eq!(serde_json::to_value(Message::user("hi")).unwrap()["role"], "user");
    }
}
