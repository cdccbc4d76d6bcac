//! Task breakdown decoding

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A main task plus ordered subtasks, as proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBreakdown {
    /// Main task title
    pub task: String,

    /// Ordered subtasks; a reply that omits the key has none
    #[serde(default)]
    pub subtasks: Vec<SubtaskSuggestion>,
}

/// One proposed subtask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSuggestion {
    pub title: String,
}

impl TaskBreakdown {
    pub fn new<I, S>(task: impl Into<String>, subtasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task: task.into(),
            subtasks: subtasks
                .into_iter()
                .map(|title| SubtaskSuggestion { title: title.into() })
                .collect(),
        }
    }

    /// Subtask titles in order
    pub fn subtask_titles(&self) -> Vec<String> {
        self.subtasks.iter().map(|s| s.title.clone()).collect()
    }
}

/// The text did not have the task breakdown shape
#[derive(Debug, Error)]
#[error("Not a task breakdown: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Strictly decode `{task: string, subtasks: [{title: string}]}`
///
/// Unknown fields are ignored. A missing `task`, a subtask without a string
/// `title`, or any wrong type is an error.
pub fn decode_breakdown(text: &str) -> Result<TaskBreakdown, DecodeError> {
    debug!(text_len = text.len(), "decode_breakdown: called");
    let breakdown: TaskBreakdown = serde_json::from_str(text)?;
    debug!(task = %breakdown.task, subtask_count = breakdown.subtasks.len(), "decode_breakdown: decoded");
    Ok(breakdown)
}
