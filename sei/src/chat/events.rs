//! Session change notifications

use super::message::{ChatMessage, MessageId};

/// Channel capacity for session events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Where the session is in its request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// A request tagged `seq` is outstanding and is the latest one issued
    AwaitingReply { seq: u64 },
}

/// Broadcast whenever observable session state changes
#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended(ChatMessage),
    PhaseChanged(SessionPhase),
    LikeChanged { id: MessageId, liked: bool },
    StaleReplyDiscarded { seq: u64 },
    SuggestionCommitted { id: MessageId, task_id: String, failed: usize },
}

impl SessionEvent {
    /// Get event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageAppended(_) => "MessageAppended",
            Self::PhaseChanged(_) => "PhaseChanged",
            Self::LikeChanged { .. } => "LikeChanged",
            Self::StaleReplyDiscarded { .. } => "StaleReplyDiscarded",
            Self::SuggestionCommitted { .. } => "SuggestionCommitted",
        }
    }
}
