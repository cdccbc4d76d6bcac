//! Interactive REPL for Sei
//!
//! Numbered chat log with slash commands to like, save and review tasks.

pub mod render;
mod session;

pub use session::ReplSession;

use eyre::Result;

use crate::chat::ChatSession;
use crate::state::StateManager;

/// Run the interactive REPL
///
/// This is the main entry point for `sei chat` and bare `sei`.
pub async fn run_interactive(chat: ChatSession, store: StateManager, initial_prompt: Option<String>) -> Result<()> {
    let mut session = ReplSession::new(chat, store);
    session.run(initial_prompt).await
}
