//! State manager messages
//!
//! Commands and responses for the actor pattern.

use std::time::Duration;

use taskstore::{NewSubtask, NewTask, Order, SubtaskRow, TaskRow};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Store round-trip timed out after {0:?}")]
    Timeout(Duration),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    InsertTask {
        row: NewTask,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListTasks {
        user_id: Option<String>,
        order: Order,
        reply: oneshot::Sender<StateResponse<Vec<TaskRow>>>,
    },
    InsertSubtask {
        row: NewSubtask,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListSubtasks {
        task_id: Option<String>,
        order: Order,
        reply: oneshot::Sender<StateResponse<Vec<SubtaskRow>>>,
    },

    // Shutdown
    Shutdown,
}
