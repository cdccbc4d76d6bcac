//! State management with actor pattern
//!
//! StateManager owns the task store and processes messages via channels,
//! providing thread-safe access to persistent state.

mod manager;
mod messages;

pub use manager::{AddTask, StateManager, TaskEntry, group_subtasks};
pub use messages::{StateCommand, StateError, StateResponse};
