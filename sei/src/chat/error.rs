//! Chat session errors

use thiserror::Error;

use super::message::MessageId;
use crate::reconcile::ReconcileError;

/// Errors from session operations
///
/// Model failures never surface here; they become the fallback message.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("No message with id {0}")]
    UnknownMessage(MessageId),

    #[error("Message {0} is not a task suggestion")]
    NotASuggestion(MessageId),

    #[error("Suggestion {0} has not been liked")]
    NotLiked(MessageId),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}
