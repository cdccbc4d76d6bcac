//! Chat log entries and reply routing

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::reply::{TaskBreakdown, decode_breakdown, extract_json_object};

/// Appended when no usable reply was obtained
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't get a response.";

/// Unique, time-ordered message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a chat message carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "kebab-case")]
pub enum MessageContent {
    PlainText(String),
    TaskSuggestion(TaskBreakdown),
}

/// One entry in the chat log; immutable once appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: MessageContent,
    pub is_user: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            content: MessageContent::PlainText(text.into()),
            is_user: true,
        }
    }

    pub fn assistant(content: MessageContent) -> Self {
        Self {
            id: MessageId::new(),
            content,
            is_user: false,
        }
    }

    /// The breakdown, if this is a task suggestion
    pub fn suggestion(&self) -> Option<&TaskBreakdown> {
        match &self.content {
            MessageContent::TaskSuggestion(breakdown) => Some(breakdown),
            MessageContent::PlainText(_) => None,
        }
    }

    /// The text, if this is a plain-text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::PlainText(text) => Some(text),
            MessageContent::TaskSuggestion(_) => None,
        }
    }
}

/// Classify a non-empty model reply
///
/// The greedy `{`..`}` span is decoded as a task breakdown; if there is no
/// span or it does not decode, the whole reply is kept as plain text.
pub fn route_reply(reply: &str) -> MessageContent {
    debug!(reply_len = reply.len(), "route_reply: called");
    let Some(candidate) = extract_json_object(reply) else {
        debug!("route_reply: no JSON object, plain text");
        return MessageContent::PlainText(reply.to_string());
    };

    match decode_breakdown(candidate) {
        Ok(breakdown) => MessageContent::TaskSuggestion(breakdown),
        Err(e) => {
            debug!(error = %e, "route_reply: not a breakdown, plain text");
            MessageContent::PlainText(reply.to_string())
        }
    }
}
