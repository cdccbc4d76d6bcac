use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use eyre::{Context, Result};
use log::info;

use taskstore::{Filter, Order, Store, SubtaskRow, TaskRow};

/// Inspect a Sei task store
#[derive(Parser, Debug)]
#[command(name = "taskstore")]
#[command(author, version, about = "Inspect task and subtask rows", long_about = None)]
struct Cli {
    /// Store directory (default: the Sei data directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Print rows as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tasks, newest first
    Tasks {
        /// Only tasks owned by this user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List subtasks, oldest first
    Subtasks {
        /// Only subtasks of this task
        #[arg(short, long)]
        task: Option<String>,
    },
}

fn setup_logging() -> Result<()> {
    // Store events are emitted with tracing; its `log` feature forwards them here
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("sei")
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn checkbox(done: bool) -> ColoredString {
    if done { "[x]".green() } else { "[ ]".dimmed() }
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let path = cli.path.unwrap_or_else(default_store_path);
    info!("taskstore opening {}", path.display());
    let store = Store::open(&path).context(format!("Failed to open store at {}", path.display()))?;

    match cli.command {
        Command::Tasks { user } => {
            let filters: Vec<Filter> = user.map(|u| Filter::eq("user_id", u)).into_iter().collect();
            let tasks: Vec<TaskRow> = store.select(&filters, Some(Order::CreatedDesc))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks found");
            } else {
                let subtasks: Vec<SubtaskRow> = store.select(&[], Some(Order::CreatedAsc))?;
                let mut by_task: BTreeMap<&str, Vec<&SubtaskRow>> = BTreeMap::new();
                for sub in &subtasks {
                    by_task.entry(sub.task_id.as_str()).or_default().push(sub);
                }
                for task in &tasks {
                    println!(
                        "{} {} {} {}",
                        checkbox(task.is_completed),
                        task.title.bold(),
                        task.id.dimmed(),
                        format_timestamp(task.created_at).dimmed()
                    );
                    for sub in by_task.get(task.id.as_str()).into_iter().flatten() {
                        println!("    {} {}", checkbox(sub.is_completed), sub.title);
                    }
                }
            }
        }
        Command::Subtasks { task } => {
            let filters: Vec<Filter> = task.map(|t| Filter::eq("task_id", t)).into_iter().collect();
            let subtasks: Vec<SubtaskRow> = store.select(&filters, Some(Order::CreatedAsc))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&subtasks)?);
            } else if subtasks.is_empty() {
                println!("No subtasks found");
            } else {
                for sub in subtasks {
                    println!(
                        "{} {} {} {}",
                        checkbox(sub.is_completed),
                        sub.title,
                        sub.task_id.cyan(),
                        sub.id.dimmed()
                    );
                }
            }
        }
    }

    Ok(())
}
