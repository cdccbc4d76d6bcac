//! Row types for the `tasks` and `subtasks` collections

use serde::{Deserialize, Serialize};

use crate::filter::IndexValue;

/// A row type stored in one collection
///
/// `columns()` lists every column in the order `from_row` reads them. The
/// first two are always `id` and `created_at`, both assigned by the store.
pub trait Record: Sized {
    fn collection_name() -> &'static str;

    fn columns() -> &'static [&'static str];

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

/// Caller-supplied values for a new row of `Self::Record`
pub trait Insertable {
    type Record: Record;

    /// Column/value pairs, excluding the store-assigned `id` and `created_at`
    fn into_values(self) -> Vec<(&'static str, IndexValue)>;
}

/// A persisted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub created_at: i64,
    pub user_id: String,
    pub title: String,
    pub is_completed: bool,
}

impl Record for TaskRow {
    fn collection_name() -> &'static str {
        "tasks"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "created_at", "user_id", "title", "is_completed"]
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            user_id: row.get(2)?,
            title: row.get(3)?,
            is_completed: row.get(4)?,
        })
    }
}

/// A persisted subtask
///
/// `task_id` is not checked against `tasks`; callers own that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskRow {
    pub id: String,
    pub created_at: i64,
    pub task_id: String,
    pub title: String,
    pub is_completed: bool,
}

impl Record for SubtaskRow {
    fn collection_name() -> &'static str {
        "subtasks"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "created_at", "task_id", "title", "is_completed"]
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            task_id: row.get(2)?,
            title: row.get(3)?,
            is_completed: row.get(4)?,
        })
    }
}

/// Insert payload for `tasks`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub is_completed: bool,
}

impl NewTask {
    /// An open (not completed) task owned by `user_id`
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            is_completed: false,
        }
    }
}

impl Insertable for NewTask {
    type Record = TaskRow;

    fn into_values(self) -> Vec<(&'static str, IndexValue)> {
        vec![
            ("user_id", IndexValue::String(self.user_id)),
            ("title", IndexValue::String(self.title)),
            ("is_completed", IndexValue::Bool(self.is_completed)),
        ]
    }
}

/// Insert payload for `subtasks`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubtask {
    pub task_id: String,
    pub title: String,
    pub is_completed: bool,
}

impl NewSubtask {
    /// An open subtask under `task_id`
    pub fn new(task_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            is_completed: false,
        }
    }
}

impl Insertable for NewSubtask {
    type Record = SubtaskRow;

    fn into_values(self) -> Vec<(&'static str, IndexValue)> {
        vec![
            ("task_id", IndexValue::String(self.task_id)),
            ("title", IndexValue::String(self.title)),
            ("is_completed", IndexValue::Bool(self.is_completed)),
        ]
    }
}
