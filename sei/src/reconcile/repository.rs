//! Store seam for the reconciler and the id-correlation strategy

use async_trait::async_trait;
use taskstore::{NewSubtask, NewTask, Order, SubtaskRow, TaskRow};
use tracing::{debug, warn};

use crate::state::StateResponse;

/// The store operations a commit needs
///
/// Inserts never return the generated id; callers discover it by reading back.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert_task(&self, row: NewTask) -> StateResponse<()>;

    /// Tasks owned by `user_id`
    async fn list_tasks(&self, user_id: &str, order: Order) -> StateResponse<Vec<TaskRow>>;

    async fn insert_subtask(&self, row: NewSubtask) -> StateResponse<()>;

    /// Every subtask in the store
    async fn list_subtasks(&self, order: Order) -> StateResponse<Vec<SubtaskRow>>;
}

/// Finds the id the store assigned to a task that was just inserted
#[async_trait]
pub trait TaskIdResolver: Send + Sync {
    /// `Ok(None)` means the user has no tasks at all after the insert.
    async fn resolve_just_inserted_task_id(
        &self,
        repo: &dyn TaskRepository,
        user_id: &str,
        title: &str,
    ) -> StateResponse<Option<String>>;
}

/// Takes the user's newest task
///
/// Another writer inserting a task for the same user between our insert and
/// this read wins the race, and its id is returned instead of ours. The title
/// is only compared to log the mismatch; it is not used to pick a row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewestTaskResolver;

#[async_trait]
impl TaskIdResolver for NewestTaskResolver {
    async fn resolve_just_inserted_task_id(
        &self,
        repo: &dyn TaskRepository,
        user_id: &str,
        title: &str,
    ) -> StateResponse<Option<String>> {
        debug!(%user_id, %title, "resolve_just_inserted_task_id: called");
        let newest = repo.list_tasks(user_id, Order::CreatedDesc).await?.into_iter().next();

        Ok(newest.map(|task| {
            if task.title != title {
                warn!(
                    task_id = %task.id,
                    expected = %title,
                    found = %task.title,
                    "Newest task title differs from the one just inserted; a concurrent insert may have won"
                );
            }
            task.id
        }))
    }
}
