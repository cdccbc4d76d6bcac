//! Sei - break goals down into tasks with a language model
//!
//! CLI entry point for the chat REPL and one-shot commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use sei::chat::{ChatSession, SendOutcome, SessionSettings};
use sei::cli::{Cli, Command};
use sei::config::Config;
use sei::llm::create_client;
use sei::reconcile::PersistenceReconciler;
use sei::repl::{self, render};
use sei::state::StateManager;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sei")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, not stdout/stderr, so the REPL stays clean
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("sei.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "Sei loaded config: provider={}, model={}, store={}",
        config.llm.provider,
        config.llm.model,
        config.store.path.display()
    );

    match cli.command {
        Some(Command::Chat { initial_prompt }) => cmd_chat(&config, initial_prompt).await,
        Some(Command::Ask { prompt, commit }) => cmd_ask(&config, &prompt, commit).await,
        Some(Command::Add { title }) => cmd_add(&config, &title).await,
        Some(Command::Tasks { json }) => cmd_tasks(&config, json).await,
        None => cmd_chat(&config, None).await,
    }
}

fn open_store(config: &Config) -> Result<StateManager> {
    StateManager::spawn(&config.store.path)
        .with_context(|| format!("Failed to open task store at {}", config.store.path.display()))
}

fn build_session(config: &Config, store: &StateManager) -> Result<ChatSession> {
    let llm = create_client(&config.llm).map_err(|e| eyre::eyre!("Failed to create LLM client: {}", e))?;
    let reconciler = PersistenceReconciler::from_config(Arc::new(store.clone()), &config.store);
    Ok(ChatSession::new(llm, reconciler, SessionSettings::from_config(config)))
}

/// Interactive chat
async fn cmd_chat(config: &Config, initial_prompt: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let chat = build_session(config, &store)?;
    repl::run_interactive(chat, store.clone(), initial_prompt).await?;
    store.shutdown().await?;
    Ok(())
}

/// One prompt, one reply; optionally save the suggestion
async fn cmd_ask(config: &Config, prompt: &str, commit: bool) -> Result<()> {
    let store = open_store(config)?;
    let chat = build_session(config, &store)?;

    match chat.send(prompt).await? {
        SendOutcome::Suggestion(message) => {
            let Some(breakdown) = message.suggestion() else {
                return Ok(());
            };
            render::print_breakdown(breakdown);
            if commit {
                chat.like(message.id).await?;
                let outcome = chat.confirm(message.id).await?;
                render::print_commit_outcome(&outcome);
            } else {
                println!("Run again with {} to save it", "--commit".yellow());
            }
        }
        SendOutcome::Text(message) | SendOutcome::Failed(message) => {
            println!("{}", message.text().unwrap_or_default());
            if commit {
                println!("{}", "Nothing to save: the reply was not a task breakdown".dimmed());
            }
        }
        SendOutcome::Stale { .. } => {}
    }

    store.shutdown().await?;
    Ok(())
}

/// Add a task by hand
async fn cmd_add(config: &Config, title: &str) -> Result<()> {
    let store = open_store(config)?;
    let result = store.add_task(&config.session.user_id, title).await?;
    render::print_add_task(&result);
    store.shutdown().await?;
    Ok(())
}

/// List saved tasks
async fn cmd_tasks(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let entries = store.task_list(&config.session.user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        render::print_task_list(&entries);
    }

    store.shutdown().await?;
    Ok(())
}
