//! Sei - natural-language goals in, tasks and subtasks out
//!
//! A chat session sends each prompt to a language model under a system
//! prompt that asks for a `{"task": ..., "subtasks": [...]}` reply. Replies
//! that decode become task suggestions; anything else is shown as text. A
//! suggestion the user likes and confirms is written to the task store as
//! one task row plus one row per subtask.
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait and the Ollama-style HTTP implementation
//! - [`reply`] - Response body decoding, JSON extraction, breakdown decoding
//! - [`chat`] - Chat session state machine and confirmation gating
//! - [`reconcile`] - Ordered task/subtask commit with partial outcomes
//! - [`state`] - Actor owning the task store
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`repl`] - Interactive terminal front end

pub mod chat;
pub mod cli;
pub mod config;
pub mod llm;
pub mod prompts;
pub mod reconcile;
pub mod repl;
pub mod reply;
pub mod state;

// Re-export commonly used types
pub use chat::{ChatError, ChatMessage, ChatSession, MessageContent, MessageId, SendOutcome, SessionEvent};
pub use config::{Config, LlmConfig};
pub use llm::{CompletionRequest, LlmClient, LlmError, OllamaClient};
pub use reconcile::{CommitOutcome, PersistenceReconciler, ReconcileError, TaskIdResolver, TaskRepository};
pub use reply::{TaskBreakdown, decode_breakdown};
pub use state::{StateError, StateManager, StateResponse};
