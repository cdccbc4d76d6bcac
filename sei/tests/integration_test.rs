//! Integration tests for Sei
//!
//! These drive a chat session end to end: HTTP model endpoint or scripted
//! client in front, the real store actor behind.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sei::chat::{ChatError, ChatSession, FALLBACK_REPLY, SendOutcome, SessionSettings};
use sei::config::LlmConfig;
use sei::llm::{CompletionRequest, LlmClient, LlmError, create_client};
use sei::reconcile::{PersistenceReconciler, TaskRepository};
use sei::state::{StateError, StateManager, StateResponse};
use taskstore::{NewSubtask, NewTask, Order, SubtaskRow, TaskRow};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// =============================================================================
// Test doubles
// =============================================================================

/// Replies with canned strings in order
struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::InvalidResponse(message)),
            None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreCall {
    InsertTask { user_id: String, title: String },
    ListTasks,
    InsertSubtask { task_id: String, title: String },
    ListSubtasks,
}

/// Store actor with a call log and optional per-title subtask failures
struct RecordingStore {
    inner: StateManager,
    calls: Mutex<Vec<StoreCall>>,
    failing_subtasks: HashSet<String>,
}

impl RecordingStore {
    fn new(inner: StateManager) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing_subtasks: HashSet::new(),
        }
    }

    fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    fn writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::InsertTask { .. } | StoreCall::InsertSubtask { .. }))
            .count()
    }
}

#[async_trait]
impl TaskRepository for RecordingStore {
    async fn insert_task(&self, row: NewTask) -> StateResponse<()> {
        self.calls.lock().unwrap().push(StoreCall::InsertTask {
            user_id: row.user_id.clone(),
            title: row.title.clone(),
        });
        self.inner.insert_task(row).await
    }

    async fn list_tasks(&self, user_id: &str, order: Order) -> StateResponse<Vec<TaskRow>> {
        self.calls.lock().unwrap().push(StoreCall::ListTasks);
        self.inner.list_tasks(Some(user_id), order).await
    }

    async fn insert_subtask(&self, row: NewSubtask) -> StateResponse<()> {
        self.calls.lock().unwrap().push(StoreCall::InsertSubtask {
            task_id: row.task_id.clone(),
            title: row.title.clone(),
        });
        if self.failing_subtasks.contains(&row.title) {
            return Err(StateError::StoreError("simulated write failure".to_string()));
        }
        self.inner.insert_subtask(row).await
    }

    async fn list_subtasks(&self, order: Order) -> StateResponse<Vec<SubtaskRow>> {
        self.calls.lock().unwrap().push(StoreCall::ListSubtasks);
        self.inner.list_subtasks(None, order).await
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        user_id: "alice".to_string(),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn session(llm: Arc<dyn LlmClient>, store: Arc<RecordingStore>) -> ChatSession {
    ChatSession::new(llm, PersistenceReconciler::new(store), settings())
}

/// Serve one canned 200 response and hand back the request body
async fn serve_once(body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let request_body = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break String::from_utf8_lossy(&buf[end + 4..]).to_string();
                }
            }
            if n == 0 {
                break String::new();
            }
        };

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request_body
    });

    (format!("http://{}", addr), handle)
}

const PARTY: &str = r#"{"task": "Plan birthday party", "subtasks": [{"title": "Pick a date"}, {"title": "Invite friends"}, {"title": "Order cake"}]}"#;

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_birthday_party_over_http_commits_task_and_subtasks() {
    let body = [
        r#"{"message":{"role":"assistant","content":"{\"task\": \"Plan birthday party\", "},"done":false}"#,
        r#"{"message":{"role":"assistant","content":"\"subtasks\": [{\"title\": \"Pick a date\"}, "},"done":false}"#,
        r#"{"message":{"role":"assistant","content":"{\"title\": \"Invite friends\"}, {\"title\": \"Order cake\"}]}"},"done":false}"#,
        r#"{"done":true}"#,
    ]
    .join("\n");
    let (base_url, server) = serve_once(body).await;

    let llm = create_client(&LlmConfig {
        base_url,
        api_key_env: "SEI_TEST_KEY_THAT_IS_NOT_SET".to_string(),
        timeout_ms: 5_000,
        ..Default::default()
    })
    .unwrap();

    let temp = TempDir::new().expect("Failed to create temp dir");
    let manager = StateManager::spawn(temp.path()).unwrap();
    let store = Arc::new(RecordingStore::new(manager.clone()));
    let chat = session(llm, store.clone());

    let outcome = chat.send("plan a birthday party").await.unwrap();
    let message = match outcome {
        SendOutcome::Suggestion(m) => m,
        other => panic!("expected a suggestion, got {:?}", other),
    };
    let breakdown = message.suggestion().unwrap();
    assert_eq!(breakdown.task, "Plan birthday party");
    assert_eq!(breakdown.subtasks.len(), 3);

    // The request carried the system prompt first, then the user prompt
    let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["messages"][1]["content"], "plan a birthday party");

    // Nothing is written until the suggestion is liked and confirmed
    assert!(matches!(chat.confirm(message.id).await, Err(ChatError::NotLiked(_))));
    assert_eq!(store.writes(), 0);

    chat.like(message.id).await.unwrap();
    let commit = chat.confirm(message.id).await.unwrap();
    assert!(commit.is_complete());

    let calls = store.calls();
    assert_eq!(
        calls[0],
        StoreCall::InsertTask {
            user_id: "alice".to_string(),
            title: "Plan birthday party".to_string()
        }
    );
    assert_eq!(calls[1], StoreCall::ListTasks);
    let subtask_inserts: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            StoreCall::InsertSubtask { task_id, title } => Some((task_id.clone(), title.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(subtask_inserts.len(), 3);
    assert!(subtask_inserts.iter().all(|(task_id, _)| *task_id == commit.task_id));
    assert_eq!(calls.last(), Some(&StoreCall::ListSubtasks));

    let tasks = manager.list_tasks(Some("alice"), Order::CreatedDesc).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, commit.task_id);
    assert!(!tasks[0].is_completed);

    let entries = manager.task_list("alice").await.unwrap();
    let titles: Vec<_> = entries[0].subtasks.iter().map(|s| s.title.clone()).collect();
    assert_eq!(titles.len(), 3);
    for expected in ["Pick a date", "Invite friends", "Order cake"] {
        assert!(titles.contains(&expected.to_string()));
    }

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_empty_reply_shows_apology_and_writes_nothing() {
    let manager = StateManager::spawn_in_memory().unwrap();
    let store = Arc::new(RecordingStore::new(manager.clone()));
    let chat = session(Arc::new(ScriptedLlm::new(vec![Ok("")])), store.clone());

    let outcome = chat.send("plan a birthday party").await.unwrap();
    match outcome {
        SendOutcome::Failed(message) => assert_eq!(message.text(), Some(FALLBACK_REPLY)),
        other => panic!("expected the fallback message, got {:?}", other),
    }

    let log = chat.messages().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].text(), Some("Sorry, I couldn't get a response."));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_transport_failure_then_recovery() {
    let manager = StateManager::spawn_in_memory().unwrap();
    let store = Arc::new(RecordingStore::new(manager));
    let llm = ScriptedLlm::new(vec![Err("connection reset"), Ok(PARTY)]);
    let chat = session(Arc::new(llm), store);

    assert!(matches!(chat.send("party").await.unwrap(), SendOutcome::Failed(_)));
    assert!(matches!(chat.send("party").await.unwrap(), SendOutcome::Suggestion(_)));
    assert_eq!(chat.messages().await.len(), 4);
}

#[tokio::test]
async fn test_second_subtask_failure_is_partial_and_not_retried() {
    let manager = StateManager::spawn_in_memory().unwrap();
    let mut recording = RecordingStore::new(manager.clone());
    recording.failing_subtasks.insert("Invite friends".to_string());
    let store = Arc::new(recording);
    let chat = session(Arc::new(ScriptedLlm::new(vec![Ok(PARTY)])), store.clone());

    let id = chat.send("plan a birthday party").await.unwrap().message().unwrap().id;
    chat.like(id).await.unwrap();
    let outcome = chat.confirm(id).await.unwrap();

    assert!(outcome.is_partial());
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].title, "Invite friends");
    assert_eq!(outcome.succeeded, vec!["Pick a date", "Order cake"]);

    let tasks = manager.list_tasks(Some("alice"), Order::CreatedAsc).await.unwrap();
    assert_eq!(tasks.len(), 1);
    let persisted = manager.list_subtasks(Some(&tasks[0].id), Order::CreatedAsc).await.unwrap();
    let titles: Vec<_> = persisted.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Pick a date"));
    assert!(titles.contains(&"Order cake"));

    let subtask_attempts = store
        .calls()
        .iter()
        .filter(|c| matches!(c, StoreCall::InsertSubtask { .. }))
        .count();
    assert_eq!(subtask_attempts, 3);
}

#[tokio::test]
async fn test_clarifying_question_is_plain_text() {
    let manager = StateManager::spawn_in_memory().unwrap();
    let store = Arc::new(RecordingStore::new(manager));
    let question = "Do you want to plan the whole party or just the food?";
    let chat = session(Arc::new(ScriptedLlm::new(vec![Ok(question)])), store);

    let outcome = chat.send("party").await.unwrap();
    let message = outcome.message().unwrap().clone();
    assert_eq!(message.text(), Some(question));
    assert!(matches!(chat.like(message.id).await, Err(ChatError::NotASuggestion(_))));
}
