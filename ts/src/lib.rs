//! TaskStore - task and subtask rows backed by SQLite
//!
//! Two collections, `tasks` and `subtasks`, each supporting insert, select
//! (with filters and creation-time ordering), update and delete.
//!
//! Inserts do not hand back the generated row id. Callers that need the id
//! of a row they just wrote must re-read the collection and correlate.
//!
//! # Example
//!
//! ```ignore
//! use taskstore::{Filter, NewTask, Order, Store, TaskRow};
//!
//! let store = Store::open_in_memory()?;
//! store.insert(NewTask::new("user-1", "Plan trip"))?;
//! let newest: Vec<TaskRow> = store.select(&[Filter::eq("user_id", "user-1")], Some(Order::CreatedDesc))?;
//! ```

mod error;
mod filter;
mod record;
mod store;

pub use error::{Result, StoreError};
pub use filter::{Filter, FilterOp, IndexValue, Order, Patch};
pub use record::{Insertable, NewSubtask, NewTask, Record, SubtaskRow, TaskRow};
pub use store::{DB_FILE_NAME, Store};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
