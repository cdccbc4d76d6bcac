//! PersistenceReconciler - commits an accepted breakdown as task + subtasks
//!
//! The store assigns ids on insert and does not return them, so a commit is a
//! strictly ordered sequence: insert the task, read back to find its id, then
//! insert each subtask against that id. A failure before the id is known
//! aborts the commit; a failure after it only affects the subtask involved.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use taskstore::{NewSubtask, NewTask, Order, SubtaskRow};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::repository::{NewestTaskResolver, TaskIdResolver, TaskRepository};
use crate::config::StoreConfig;
use crate::reply::TaskBreakdown;
use crate::state::{StateError, StateResponse};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SUBTASK_CONCURRENCY: usize = 4;

/// A commit that stopped before any subtask was attempted
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to insert task: {0}")]
    TaskInsert(StateError),

    #[error("Failed to read back inserted task: {0}")]
    Resolve(StateError),

    #[error("No task found for user '{user_id}' after insert")]
    NoTaskResolved { user_id: String },
}

impl ReconcileError {
    /// Whether a task row may have been written before the commit stopped
    ///
    /// A timed-out insert may still have landed.
    pub fn task_may_exist(&self) -> bool {
        !matches!(self, Self::TaskInsert(e) if !matches!(e, StateError::Timeout(_)))
    }
}

/// A subtask insert that failed, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSubtask {
    pub title: String,
    pub reason: String,

    /// The insert timed out, so the row may have landed anyway
    pub may_exist: bool,
}

/// Result of a commit that got as far as resolving the task id
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Id the resolver attributed to the inserted task
    pub task_id: String,

    /// Task title as committed
    pub task_title: String,

    /// Subtask titles inserted, in suggestion order
    pub succeeded: Vec<String>,

    /// Subtask inserts that failed, in suggestion order
    pub failed: Vec<FailedSubtask>,

    /// All subtasks re-read after the inserts; `None` if the re-read failed
    pub subtasks: Option<Vec<SubtaskRow>>,
}

impl CommitOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Subtasks belonging to this commit's task, from the refreshed list
    pub fn task_subtasks(&self) -> Vec<&SubtaskRow> {
        self.subtasks
            .iter()
            .flatten()
            .filter(|s| s.task_id == self.task_id)
            .collect()
    }
}

/// Writes task breakdowns through a [`TaskRepository`]
#[derive(Clone)]
pub struct PersistenceReconciler {
    repo: Arc<dyn TaskRepository>,
    resolver: Arc<dyn TaskIdResolver>,
    store_timeout: Duration,
    subtask_concurrency: usize,
}

impl PersistenceReconciler {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self {
            repo,
            resolver: Arc::new(NewestTaskResolver),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            subtask_concurrency: DEFAULT_SUBTASK_CONCURRENCY,
        }
    }

    pub fn from_config(repo: Arc<dyn TaskRepository>, config: &StoreConfig) -> Self {
        Self::new(repo)
            .with_store_timeout(config.timeout())
            .with_subtask_concurrency(config.subtask_concurrency)
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TaskIdResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_subtask_concurrency(mut self, concurrency: usize) -> Self {
        self.subtask_concurrency = concurrency.max(1);
        self
    }

    /// Commit `breakdown` for `user_id`
    ///
    /// Subtask failures do not fail the commit; they are reported in
    /// [`CommitOutcome::failed`] and never retried here.
    pub async fn commit(&self, breakdown: &TaskBreakdown, user_id: &str) -> Result<CommitOutcome, ReconcileError> {
        debug!(%user_id, task = %breakdown.task, subtask_count = breakdown.subtasks.len(), "commit: called");

        self.bounded(self.repo.insert_task(NewTask::new(user_id, &breakdown.task)))
            .await
            .map_err(ReconcileError::TaskInsert)?;

        let resolved = self
            .bounded(
                self.resolver
                    .resolve_just_inserted_task_id(self.repo.as_ref(), user_id, &breakdown.task),
            )
            .await
            .map_err(ReconcileError::Resolve)?;

        let Some(task_id) = resolved else {
            warn!(%user_id, task = %breakdown.task, "commit: inserted task not found on read-back");
            return Err(ReconcileError::NoTaskResolved {
                user_id: user_id.to_string(),
            });
        };
        debug!(%task_id, "commit: resolved task id");

        let (succeeded, failed) = self.insert_subtasks(&task_id, breakdown.subtask_titles()).await;
        let subtasks = self.refresh_subtasks().await;

        info!(
            %task_id,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "Committed task breakdown"
        );

        Ok(CommitOutcome {
            task_id,
            task_title: breakdown.task.clone(),
            succeeded,
            failed,
            subtasks,
        })
    }

    /// Re-attempt only the failed subtasks of `outcome` against its task id
    ///
    /// The task's subtasks are re-read first; a failed title that is stored
    /// more times than `succeeded` accounts for is counted as saved instead
    /// of inserted again. If the re-read fails, entries that may exist stay
    /// failed and only the definite failures are re-inserted.
    pub async fn retry_failed(&self, outcome: &CommitOutcome) -> CommitOutcome {
        debug!(task_id = %outcome.task_id, failed = outcome.failed.len(), "retry_failed: called");
        let mut succeeded = outcome.succeeded.clone();
        let mut failed = Vec::new();
        let mut titles = Vec::new();

        match self.bounded(self.repo.list_subtasks(Order::CreatedAsc)).await {
            Ok(rows) => {
                let mut unaccounted: HashMap<&str, usize> = HashMap::new();
                for row in rows.iter().filter(|s| s.task_id == outcome.task_id) {
                    *unaccounted.entry(row.title.as_str()).or_default() += 1;
                }
                for title in &outcome.succeeded {
                    if let Some(n) = unaccounted.get_mut(title.as_str()) {
                        *n = n.saturating_sub(1);
                    }
                }
                for entry in &outcome.failed {
                    match unaccounted.get_mut(entry.title.as_str()) {
                        Some(n) if *n > 0 => {
                            *n -= 1;
                            info!(task_id = %outcome.task_id, title = %entry.title, "Subtask already stored; not inserting again");
                            succeeded.push(entry.title.clone());
                        }
                        _ => titles.push(entry.title.clone()),
                    }
                }
            }
            Err(e) => {
                warn!(task_id = %outcome.task_id, error = %e, "Failed to re-read subtasks before retry");
                for entry in &outcome.failed {
                    if entry.may_exist {
                        failed.push(entry.clone());
                    } else {
                        titles.push(entry.title.clone());
                    }
                }
            }
        }

        let (newly_succeeded, newly_failed) = self.insert_subtasks(&outcome.task_id, titles).await;
        succeeded.extend(newly_succeeded);
        failed.extend(newly_failed);
        let subtasks = self.refresh_subtasks().await;

        CommitOutcome {
            task_id: outcome.task_id.clone(),
            task_title: outcome.task_title.clone(),
            succeeded,
            failed,
            subtasks,
        }
    }

    /// Insert each title under `task_id`; results keep input order
    async fn insert_subtasks(&self, task_id: &str, titles: Vec<String>) -> (Vec<String>, Vec<FailedSubtask>) {
        debug!(%task_id, count = titles.len(), concurrency = self.subtask_concurrency, "insert_subtasks: called");
        let results: Vec<(String, StateResponse<()>)> = stream::iter(titles.into_iter().map(|title| {
            let row = NewSubtask::new(task_id, &title);
            async move {
                let result = self.bounded(self.repo.insert_subtask(row)).await;
                (title, result)
            }
        }))
        .buffered(self.subtask_concurrency)
        .collect()
        .await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (title, result) in results {
            match result {
                Ok(()) => succeeded.push(title),
                Err(e) => {
                    warn!(%task_id, %title, error = %e, "Subtask insert failed");
                    failed.push(FailedSubtask {
                        title,
                        reason: e.to_string(),
                        may_exist: matches!(e, StateError::Timeout(_)),
                    });
                }
            }
        }
        (succeeded, failed)
    }

    async fn refresh_subtasks(&self) -> Option<Vec<SubtaskRow>> {
        match self.bounded(self.repo.list_subtasks(Order::CreatedAsc)).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(error = %e, "Failed to refresh subtasks after commit");
                None
            }
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = StateResponse<T>>) -> StateResponse<T> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .unwrap_or(Err(StateError::Timeout(self.store_timeout)))
    }
}
