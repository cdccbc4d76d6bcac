//! REPL session management

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::render;
use crate::chat::{ChatError, ChatMessage, ChatSession, MessageId, SendOutcome};
use crate::reconcile::CommitOutcome;
use crate::state::{AddTask, StateManager};

/// Interactive REPL session
pub struct ReplSession {
    chat: ChatSession,
    store: StateManager,
    last_partial: Option<CommitOutcome>,
}

/// What the main loop should do after a slash command
#[derive(Debug, PartialEq, Eq)]
enum SlashResult {
    Continue,
    Quit,
}

impl ReplSession {
    pub fn new(chat: ChatSession, store: StateManager) -> Self {
        Self {
            chat,
            store,
            last_partial: None,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_prompt: Option<String>) -> Result<()> {
        self.print_welcome();

        if let Some(prompt) = initial_prompt {
            println!("{} {}", ">".bright_green(), prompt);
            self.process_user_input(&prompt).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_user_input(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Sei".bright_cyan().bold());
        println!("Describe something you want to get done and I'll break it into tasks.");
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn process_user_input(&mut self, input: &str) {
        debug!(input_len = input.len(), "process_user_input: called");
        println!("{}", "Thinking...".dimmed());

        match self.chat.send(input).await {
            Ok(SendOutcome::Stale { .. }) => {}
            Ok(outcome) => {
                if let Some(message) = outcome.message() {
                    let number = self.chat.messages().await.len();
                    render::print_message(number, message, false);
                    if message.suggestion().is_some() {
                        println!(
                            "Use {} then {} to save it",
                            format!("/like {}", number).yellow(),
                            format!("/add {}", number).yellow()
                        );
                    }
                }
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");
        let arg = parts.get(1).copied();
        debug!(%cmd, ?arg, "handle_slash_command: called");

        match cmd {
            "/help" | "/h" => self.print_help(),
            "/quit" | "/q" | "/exit" => return SlashResult::Quit,
            "/history" => self.print_history().await,
            "/like" => {
                if let Some(id) = self.message_arg(arg).await {
                    match self.chat.like(id).await {
                        Ok(()) => println!("{} Liked", "♥".bright_red()),
                        Err(e) => println!("{} {}", "✗".red(), e),
                    }
                }
            }
            "/unlike" => {
                if let Some(id) = self.message_arg(arg).await {
                    if self.chat.unlike(id).await {
                        println!("Like removed");
                    } else {
                        println!("{}", "That message was not liked".dimmed());
                    }
                }
            }
            "/add" => {
                if let Some(id) = self.message_arg(arg).await {
                    self.confirm(id).await;
                }
            }
            "/new" => {
                let title = input.trim_start().strip_prefix(cmd).unwrap_or("");
                self.add_task(title).await;
            }
            "/retry" => self.retry().await,
            "/tasks" => match self.store.task_list(self.chat.user_id()).await {
                Ok(entries) => render::print_task_list(&entries),
                Err(e) => println!("{} Could not load tasks: {}", "✗".red(), e),
            },
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    /// Resolve a 1-based message number to its id
    async fn message_arg(&self, arg: Option<&str>) -> Option<MessageId> {
        let Some(number) = arg.and_then(|a| a.parse::<usize>().ok()) else {
            println!("{} Expected a message number, e.g. {}", "?".yellow(), "/like 2".yellow());
            return None;
        };
        let messages = self.chat.messages().await;
        match number.checked_sub(1).and_then(|i| messages.get(i)) {
            Some(message) => Some(message.id),
            None => {
                println!("{} No message number {}", "?".yellow(), number);
                None
            }
        }
    }

    async fn confirm(&mut self, id: MessageId) {
        println!("{}", "Saving...".dimmed());
        match self.chat.confirm(id).await {
            Ok(outcome) => {
                render::print_commit_outcome(&outcome);
                self.last_partial = outcome.is_partial().then_some(outcome);
            }
            Err(ChatError::NotLiked(_)) => {
                println!("{} Like the suggestion first with {}", "?".yellow(), "/like N".yellow());
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    async fn add_task(&self, title: &str) {
        match self.store.add_task(self.chat.user_id(), title).await {
            Ok(AddTask::EmptyTitle) => {
                println!("{} Expected a title, e.g. {}", "?".yellow(), "/new Buy milk".yellow());
            }
            Ok(added) => render::print_add_task(&added),
            Err(e) => println!("{} Could not add task: {}", "✗".red(), e),
        }
    }

    async fn retry(&mut self) {
        let Some(previous) = self.last_partial.take() else {
            println!("{}", "Nothing to retry.".dimmed());
            return;
        };
        let outcome = self.chat.retry_failed(&previous).await;
        render::print_commit_outcome(&outcome);
        self.last_partial = outcome.is_partial().then_some(outcome);
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the REPL", "/quit".yellow());
        println!("  {:14} Show the numbered conversation", "/history".yellow());
        println!("  {:14} Like suggestion N", "/like N".yellow());
        println!("  {:14} Remove the like from N", "/unlike N".yellow());
        println!("  {:14} Save liked suggestion N", "/add N".yellow());
        println!("  {:14} Add a task by hand", "/new TITLE".yellow());
        println!("  {:14} Retry subtasks that failed to save", "/retry".yellow());
        println!("  {:14} List saved tasks", "/tasks".yellow());
        println!();
    }

    async fn print_history(&self) {
        let messages = self.chat.messages().await;
        if messages.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, message) in messages.iter().enumerate() {
            let liked = self.chat.is_liked(message.id).await;
            print_history_line(i + 1, message, liked);
        }
        println!();
    }
}

fn print_history_line(number: usize, message: &ChatMessage, liked: bool) {
    let role = if message.is_user {
        "You".bright_green()
    } else {
        "Sei".bright_blue()
    };
    let heart = if liked { " ♥" } else { "" };
    println!("  {:>3}. {}: {}{}", number, role, render::preview(message), heart.bright_red());
}
