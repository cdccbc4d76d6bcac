//! ChatSession - one conversation with the model
//!
//! Owns the message log, the request sequence counter and the liked set.
//! Every request is tagged with a monotonically increasing sequence number;
//! a reply whose number is no longer the latest issued is dropped rather
//! than appended. Observers follow along through [`ChatSession::subscribe`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::error::ChatError;
use super::events::{EVENT_CHANNEL_CAPACITY, SessionEvent, SessionPhase};
use super::message::{ChatMessage, FALLBACK_REPLY, MessageContent, MessageId, route_reply};
use crate::config::Config;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::prompts;
use crate::reconcile::{CommitOutcome, PersistenceReconciler};

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Owner of every task this session commits
    pub user_id: String,

    /// Upper bound on one model round-trip
    pub request_timeout: Duration,

    /// Sent as the first message of every request
    pub system_prompt: String,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_id: config.session.user_id.clone(),
            request_timeout: config.llm.timeout(),
            system_prompt: prompts::BREAKDOWN.to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How a [`ChatSession::send`] call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply decoded as a task breakdown
    Suggestion(ChatMessage),
    /// The reply was kept as plain text
    Text(ChatMessage),
    /// No usable reply; the fallback message was appended
    Failed(ChatMessage),
    /// A newer request was issued before this reply arrived; nothing appended
    Stale { seq: u64 },
}

impl SendOutcome {
    /// The appended response message, unless the reply was discarded
    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Suggestion(m) | Self::Text(m) | Self::Failed(m) => Some(m),
            Self::Stale { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    log: Vec<ChatMessage>,
    liked: HashSet<MessageId>,
    latest_seq: u64,
    phase: SessionPhase,
}

impl SessionState {
    fn find(&self, id: MessageId) -> Option<&ChatMessage> {
        self.log.iter().find(|m| m.id == id)
    }
}

/// A chat conversation that turns prompts into suggestions and commits liked ones
pub struct ChatSession {
    llm: Arc<dyn LlmClient>,
    reconciler: PersistenceReconciler,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSession {
    pub fn new(llm: Arc<dyn LlmClient>, reconciler: PersistenceReconciler, settings: SessionSettings) -> Self {
        debug!(user_id = %settings.user_id, "ChatSession::new: called");
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            llm,
            reconciler,
            settings,
            state: Mutex::new(SessionState::default()),
            events,
        }
    }

    /// Subscribe to session changes
    ///
    /// Only events emitted after subscription are received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        debug!("subscribe: new subscriber");
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        debug!(event_type = event.event_type(), "emit: called");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Snapshot of the message log
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.log.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub fn user_id(&self) -> &str {
        &self.settings.user_id
    }

    /// Send a prompt and append exactly one response message
    ///
    /// The user message is appended before the request is issued. Transport
    /// failure, timeout and an empty reply all append [`FALLBACK_REPLY`].
    pub async fn send(&self, prompt: &str) -> Result<SendOutcome, ChatError> {
        let prompt = prompt.trim();
        debug!(prompt_len = prompt.len(), "send: called");
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        let seq = {
            let mut state = self.state.lock().await;
            state.latest_seq += 1;
            let seq = state.latest_seq;
            let message = ChatMessage::user(prompt);
            state.log.push(message.clone());
            state.phase = SessionPhase::AwaitingReply { seq };
            self.emit(SessionEvent::MessageAppended(message));
            self.emit(SessionEvent::PhaseChanged(state.phase));
            seq
        };

        let request = CompletionRequest::single(self.settings.system_prompt.clone(), prompt);
        let result = tokio::time::timeout(self.settings.request_timeout, self.llm.complete(request))
            .await
            .unwrap_or(Err(LlmError::Timeout(self.settings.request_timeout)));

        let (content, failed) = match result {
            Ok(reply) if reply.trim().is_empty() => {
                warn!(seq, "Model returned an empty reply");
                (MessageContent::PlainText(FALLBACK_REPLY.to_string()), true)
            }
            Ok(reply) => (route_reply(&reply), false),
            Err(e) => {
                warn!(seq, error = %e, "Model request failed");
                (MessageContent::PlainText(FALLBACK_REPLY.to_string()), true)
            }
        };

        let mut state = self.state.lock().await;
        if state.latest_seq != seq {
            info!(seq, latest = state.latest_seq, "Discarding stale reply");
            self.emit(SessionEvent::StaleReplyDiscarded { seq });
            return Ok(SendOutcome::Stale { seq });
        }

        let message = ChatMessage::assistant(content);
        state.log.push(message.clone());
        state.phase = SessionPhase::Idle;
        self.emit(SessionEvent::MessageAppended(message.clone()));
        self.emit(SessionEvent::PhaseChanged(SessionPhase::Idle));

        Ok(if failed {
            SendOutcome::Failed(message)
        } else if message.suggestion().is_some() {
            SendOutcome::Suggestion(message)
        } else {
            SendOutcome::Text(message)
        })
    }

    /// Mark a task suggestion as liked; liking twice is a no-op
    pub async fn like(&self, id: MessageId) -> Result<(), ChatError> {
        debug!(%id, "like: called");
        let mut state = self.state.lock().await;
        let message = state.find(id).ok_or(ChatError::UnknownMessage(id))?;
        if message.suggestion().is_none() {
            return Err(ChatError::NotASuggestion(id));
        }
        if state.liked.insert(id) {
            self.emit(SessionEvent::LikeChanged { id, liked: true });
        }
        Ok(())
    }

    /// Clear the liked flag; returns whether it was set
    pub async fn unlike(&self, id: MessageId) -> bool {
        debug!(%id, "unlike: called");
        let removed = self.state.lock().await.liked.remove(&id);
        if removed {
            self.emit(SessionEvent::LikeChanged { id, liked: false });
        }
        removed
    }

    pub async fn is_liked(&self, id: MessageId) -> bool {
        self.state.lock().await.liked.contains(&id)
    }

    /// Commit a liked suggestion
    ///
    /// The liked flag is taken before the commit starts, so a second confirm
    /// of the same message fails with [`ChatError::NotLiked`]. It is given
    /// back only when the commit failed without writing a task row.
    pub async fn confirm(&self, id: MessageId) -> Result<CommitOutcome, ChatError> {
        debug!(%id, "confirm: called");
        let breakdown = {
            let mut state = self.state.lock().await;
            let message = state.find(id).ok_or(ChatError::UnknownMessage(id))?;
            let breakdown = message.suggestion().cloned().ok_or(ChatError::NotASuggestion(id))?;
            if !state.liked.remove(&id) {
                return Err(ChatError::NotLiked(id));
            }
            breakdown
        };
        self.emit(SessionEvent::LikeChanged { id, liked: false });

        match self.reconciler.commit(&breakdown, &self.settings.user_id).await {
            Ok(outcome) => {
                self.emit(SessionEvent::SuggestionCommitted {
                    id,
                    task_id: outcome.task_id.clone(),
                    failed: outcome.failed.len(),
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(%id, error = %e, "Commit failed");
                if !e.task_may_exist() {
                    self.state.lock().await.liked.insert(id);
                    self.emit(SessionEvent::LikeChanged { id, liked: true });
                }
                Err(e.into())
            }
        }
    }

    /// Re-attempt the failed subtasks of an earlier commit
    pub async fn retry_failed(&self, outcome: &CommitOutcome) -> CommitOutcome {
        debug!(task_id = %outcome.task_id, "retry_failed: called");
        self.reconciler.retry_failed(outcome).await
    }
}
