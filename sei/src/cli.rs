//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sei - break goals down into tasks with a language model
#[derive(Parser)]
#[command(
    name = "sei",
    about = "Chat with a language model that breaks goals into tasks and subtasks",
    version,
    after_help = "Logs are written to: ~/.local/share/sei/logs/sei.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive chat (the default)
    Chat {
        /// First prompt to send before reading input
        initial_prompt: Option<String>,
    },

    /// Send one prompt and print the reply
    Ask {
        /// What you want to get done
        prompt: String,

        /// Save a suggested breakdown without asking
        #[arg(long)]
        commit: bool,
    },

    /// Add a task by hand, without asking the model
    Add {
        /// Task title
        title: String,
    },

    /// List saved tasks with their subtasks
    Tasks {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
