//! Committing accepted suggestions into the task store

mod reconciler;
mod repository;

pub use reconciler::{CommitOutcome, FailedSubtask, PersistenceReconciler, ReconcileError};
pub use repository::{NewestTaskResolver, TaskIdResolver, TaskRepository};
