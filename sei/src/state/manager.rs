//! StateManager - actor that owns the task store
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use taskstore::{Filter, NewSubtask, NewTask, Order, Store, SubtaskRow, TaskRow};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{StateCommand, StateError, StateResponse};
use crate::reconcile::TaskRepository;

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store in `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;
        info!(path = ?store.path(), "Opened task store");
        Ok(Self::start(store))
    }

    /// Spawn a StateManager over a private in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        let store = Store::open_in_memory()?;
        Ok(Self::start(store))
    }

    fn start(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Insert a task row; the store assigns its id
    pub async fn insert_task(&self, row: NewTask) -> StateResponse<()> {
        debug!(user_id = %row.user_id, title = %row.title, "insert_task: called");
        self.request(|reply| StateCommand::InsertTask { row, reply }).await
    }

    /// List tasks, optionally only those owned by `user_id`
    pub async fn list_tasks(&self, user_id: Option<&str>, order: Order) -> StateResponse<Vec<TaskRow>> {
        debug!(?user_id, ?order, "list_tasks: called");
        let user_id = user_id.map(str::to_string);
        self.request(|reply| StateCommand::ListTasks { user_id, order, reply })
            .await
    }

    /// Insert a subtask row
    pub async fn insert_subtask(&self, row: NewSubtask) -> StateResponse<()> {
        debug!(task_id = %row.task_id, title = %row.title, "insert_subtask: called");
        self.request(|reply| StateCommand::InsertSubtask { row, reply }).await
    }

    /// List subtasks, optionally only those under `task_id`
    pub async fn list_subtasks(&self, task_id: Option<&str>, order: Order) -> StateResponse<Vec<SubtaskRow>> {
        debug!(?task_id, ?order, "list_subtasks: called");
        let task_id = task_id.map(str::to_string);
        self.request(|reply| StateCommand::ListSubtasks { task_id, order, reply })
            .await
    }

    /// Add a task by hand for `user_id`
    ///
    /// The title is trimmed. Blank titles and a repeat of the user's newest
    /// task title are skipped without writing.
    pub async fn add_task(&self, user_id: &str, title: &str) -> StateResponse<AddTask> {
        debug!(%user_id, %title, "add_task: called");
        let title = title.trim();
        if title.is_empty() {
            return Ok(AddTask::EmptyTitle);
        }

        let newest = self.list_tasks(Some(user_id), Order::CreatedDesc).await?;
        if newest.first().is_some_and(|t| t.title == title) {
            info!(%user_id, %title, "Skipping task identical to the previous one");
            return Ok(AddTask::DuplicateOfLast);
        }

        self.insert_task(NewTask::new(user_id, title)).await?;
        Ok(AddTask::Added(title.to_string()))
    }

    /// The user's tasks, newest first, each with its subtasks oldest first
    pub async fn task_list(&self, user_id: &str) -> StateResponse<Vec<TaskEntry>> {
        debug!(%user_id, "task_list: called");
        let tasks = self.list_tasks(Some(user_id), Order::CreatedDesc).await?;
        let subtasks = self.list_subtasks(None, Order::CreatedAsc).await?;
        Ok(group_subtasks(tasks, subtasks))
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

#[async_trait]
impl TaskRepository for StateManager {
    async fn insert_task(&self, row: NewTask) -> StateResponse<()> {
        StateManager::insert_task(self, row).await
    }

    async fn list_tasks(&self, user_id: &str, order: Order) -> StateResponse<Vec<TaskRow>> {
        StateManager::list_tasks(self, Some(user_id), order).await
    }

    async fn insert_subtask(&self, row: NewSubtask) -> StateResponse<()> {
        StateManager::insert_subtask(self, row).await
    }

    async fn list_subtasks(&self, order: Order) -> StateResponse<Vec<SubtaskRow>> {
        StateManager::list_subtasks(self, None, order).await
    }
}

/// What [`StateManager::add_task`] did with a title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTask {
    /// Inserted under the trimmed title
    Added(String),
    EmptyTitle,
    DuplicateOfLast,
}

/// A task together with its subtasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEntry {
    #[serde(flatten)]
    pub task: TaskRow,
    pub subtasks: Vec<SubtaskRow>,
}

/// Attach each subtask to its task, keeping both input orders
///
/// Subtasks whose task is not in `tasks` are dropped.
pub fn group_subtasks(tasks: Vec<TaskRow>, subtasks: Vec<SubtaskRow>) -> Vec<TaskEntry> {
    let mut by_task: HashMap<String, Vec<SubtaskRow>> = HashMap::new();
    for subtask in subtasks {
        by_task.entry(subtask.task_id.clone()).or_default().push(subtask);
    }

    tasks
        .into_iter()
        .map(|task| TaskEntry {
            subtasks: by_task.remove(&task.id).unwrap_or_default(),
            task,
        })
        .collect()
}

fn store_err(e: taskstore::StoreError) -> StateError {
    StateError::StoreError(e.to_string())
}

/// The actor loop that processes commands
async fn actor_loop(store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: called");
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::InsertTask { row, reply } => {
                debug!(title = %row.title, "actor_loop: InsertTask command");
                let _ = reply.send(store.insert(row).map_err(store_err));
            }

            StateCommand::ListTasks { user_id, order, reply } => {
                debug!(?user_id, "actor_loop: ListTasks command");
                let filters: Vec<Filter> = user_id.map(|u| Filter::eq("user_id", u)).into_iter().collect();
                let _ = reply.send(store.select::<TaskRow>(&filters, Some(order)).map_err(store_err));
            }

            StateCommand::InsertSubtask { row, reply } => {
                debug!(task_id = %row.task_id, "actor_loop: InsertSubtask command");
                let _ = reply.send(store.insert(row).map_err(store_err));
            }

            StateCommand::ListSubtasks { task_id, order, reply } => {
                debug!(?task_id, "actor_loop: ListSubtasks command");
                let filters: Vec<Filter> = task_id.map(|t| Filter::eq("task_id", t)).into_iter().collect();
                let _ = reply.send(store.select::<SubtaskRow>(&filters, Some(order)).map_err(store_err));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_manager_task_roundtrip() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        manager.insert_task(NewTask::new("u1", "Plan party")).await.unwrap();
        manager.insert_task(NewTask::new("u2", "Other user")).await.unwrap();

        let all = manager.list_tasks(None, Order::CreatedAsc).await.unwrap();
        assert_eq!(all.len(), 2);

        let mine = manager.list_tasks(Some("u1"), Order::CreatedDesc).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Plan party");
        assert!(!mine[0].is_completed);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_manager_newest_first() {
        let manager = StateManager::spawn_in_memory().unwrap();

        manager.insert_task(NewTask::new("u1", "first")).await.unwrap();
        manager.insert_task(NewTask::new("u1", "second")).await.unwrap();

        let tasks = manager.list_tasks(Some("u1"), Order::CreatedDesc).await.unwrap();
        assert_eq!(tasks[0].title, "second");
        assert_eq!(tasks[1].title, "first");
    }

    #[tokio::test]
    async fn test_state_manager_subtasks_filtered_by_task() {
        let manager = StateManager::spawn_in_memory().unwrap();

        manager.insert_task(NewTask::new("u1", "Plan party")).await.unwrap();
        let task_id = manager.list_tasks(Some("u1"), Order::CreatedDesc).await.unwrap()[0]
            .id
            .clone();

        manager.insert_subtask(NewSubtask::new(&task_id, "Invite")).await.unwrap();
        manager.insert_subtask(NewSubtask::new(&task_id, "Cake")).await.unwrap();
        manager.insert_subtask(NewSubtask::new("elsewhere", "Stray")).await.unwrap();

        let subtasks = manager.list_subtasks(Some(&task_id), Order::CreatedAsc).await.unwrap();
        let titles: Vec<_> = subtasks.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Invite", "Cake"]);

        let everything = manager.list_subtasks(None, Order::CreatedAsc).await.unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn test_task_list_groups_subtasks() {
        let manager = StateManager::spawn_in_memory().unwrap();

        manager.insert_task(NewTask::new("u1", "older")).await.unwrap();
        manager.insert_task(NewTask::new("u1", "newer")).await.unwrap();
        let tasks = manager.list_tasks(Some("u1"), Order::CreatedAsc).await.unwrap();
        let (older, newer) = (tasks[0].id.clone(), tasks[1].id.clone());

        manager.insert_subtask(NewSubtask::new(&newer, "n1")).await.unwrap();
        manager.insert_subtask(NewSubtask::new(&older, "o1")).await.unwrap();
        manager.insert_subtask(NewSubtask::new(&newer, "n2")).await.unwrap();
        manager.insert_subtask(NewSubtask::new("orphan", "x")).await.unwrap();

        let entries = manager.task_list("u1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].task.title, "newer");
        let titles: Vec<_> = entries[0].subtasks.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["n1", "n2"]);
        assert_eq!(entries[1].task.title, "older");
        assert_eq!(entries[1].subtasks.len(), 1);
    }

    #[tokio::test]
    async fn test_add_task_trims_title() {
        let manager = StateManager::spawn_in_memory().unwrap();

        let added = manager.add_task("u1", "  Water plants \n").await.unwrap();
        assert_eq!(added, AddTask::Added("Water plants".to_string()));

        let tasks = manager.list_tasks(Some("u1"), Order::CreatedDesc).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Water plants");
    }

    #[tokio::test]
    async fn test_add_task_rejects_blank_title() {
        let manager = StateManager::spawn_in_memory().unwrap();

        assert_eq!(manager.add_task("u1", "").await.unwrap(), AddTask::EmptyTitle);
        assert_eq!(manager.add_task("u1", " \t\n").await.unwrap(), AddTask::EmptyTitle);
        assert!(manager.list_tasks(None, Order::CreatedAsc).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_task_skips_consecutive_duplicate() {
        let manager = StateManager::spawn_in_memory().unwrap();

        manager.add_task("u1", "Call mom").await.unwrap();
        let again = manager.add_task("u1", " Call mom ").await.unwrap();
        assert_eq!(again, AddTask::DuplicateOfLast);
        assert_eq!(manager.list_tasks(Some("u1"), Order::CreatedAsc).await.unwrap().len(), 1);

        // Only the newest task counts, and only the same user's
        manager.add_task("u1", "Pay rent").await.unwrap();
        let repeat = manager.add_task("u1", "Call mom").await.unwrap();
        assert_eq!(repeat, AddTask::Added("Call mom".to_string()));
        let other_user = manager.add_task("u2", "Call mom").await.unwrap();
        assert_eq!(other_user, AddTask::Added("Call mom".to_string()));
        assert_eq!(manager.list_tasks(Some("u1"), Order::CreatedAsc).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_state_manager_after_shutdown_is_channel_error() {
        let manager = StateManager::spawn_in_memory().unwrap();
        manager.shutdown().await.unwrap();

        // Give the actor a moment to exit its loop
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let err = manager.insert_task(NewTask::new("u1", "late")).await.unwrap_err();
        assert!(matches!(err, StateError::ChannelError));
    }

    #[tokio::test]
    async fn test_state_manager_repository_lists_by_user() {
        let manager = StateManager::spawn_in_memory().unwrap();
        let repo: &dyn TaskRepository = &manager;

        repo.insert_task(NewTask::new("u1", "mine")).await.unwrap();
        repo.insert_task(NewTask::new("u2", "theirs")).await.unwrap();

        let tasks = repo.list_tasks("u1", Order::CreatedDesc).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "mine");
    }
}
