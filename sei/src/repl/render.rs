//! Terminal rendering for chat messages, commit outcomes and task lists

use colored::Colorize;

use crate::chat::{ChatMessage, MessageContent};
use crate::reconcile::CommitOutcome;
use crate::reply::TaskBreakdown;
use crate::state::{AddTask, TaskEntry};

const PREVIEW_CHARS: usize = 60;

/// Print one log entry with its 1-based number
pub fn print_message(number: usize, message: &ChatMessage, liked: bool) {
    let marker = format!("[{}]", number).dimmed();
    if message.is_user {
        let text = message.text().unwrap_or_default();
        println!("{} {} {}", marker, ">".bright_green(), text);
        return;
    }

    match &message.content {
        MessageContent::PlainText(text) => println!("{} {}", marker, text),
        MessageContent::TaskSuggestion(breakdown) => {
            let heart = if liked { " ♥".bright_red().to_string() } else { String::new() };
            println!("{} {}{}", marker, "Suggested task".bright_cyan().bold(), heart);
            print_breakdown(breakdown);
        }
    }
}

/// Print a breakdown as a task with a checklist of subtasks
pub fn print_breakdown(breakdown: &TaskBreakdown) {
    println!("    {}", breakdown.task.bold());
    if breakdown.subtasks.is_empty() {
        println!("      {}", "(no subtasks)".dimmed());
    }
    for subtask in &breakdown.subtasks {
        println!("      {} {}", "☐".dimmed(), subtask.title);
    }
}

/// One-line preview of a message for `/history`
pub fn preview(message: &ChatMessage) -> String {
    match &message.content {
        MessageContent::PlainText(text) => {
            let preview: String = text.chars().take(PREVIEW_CHARS).collect();
            if text.chars().count() > PREVIEW_CHARS {
                format!("{}...", preview)
            } else {
                preview
            }
        }
        MessageContent::TaskSuggestion(b) => format!("[task] {} ({} subtasks)", b.task, b.subtasks.len()),
    }
}

/// Report what a commit wrote and what it could not
pub fn print_commit_outcome(outcome: &CommitOutcome) {
    if outcome.is_complete() {
        println!(
            "{} Saved \"{}\" with {} subtask(s)",
            "✓".bright_green(),
            outcome.task_title,
            outcome.succeeded.len()
        );
    } else {
        println!(
            "{} Saved \"{}\" but {} of {} subtask(s) failed",
            "!".yellow().bold(),
            outcome.task_title,
            outcome.failed.len(),
            outcome.succeeded.len() + outcome.failed.len()
        );
        for failed in &outcome.failed {
            let note = if failed.may_exist { ", may have been saved" } else { "" };
            println!("    {} {} ({}{})", "✗".red(), failed.title, failed.reason.dimmed(), note.dimmed());
        }
        println!("Use {} to try the failed subtasks again", "/retry".yellow());
    }

    if outcome.subtasks.is_none() {
        println!("{}", "Could not refresh subtasks; /tasks may be stale".dimmed());
    }
}

/// Report a task added by hand
pub fn print_add_task(result: &AddTask) {
    match result {
        AddTask::Added(title) => println!("{} Added \"{}\"", "✓".bright_green(), title),
        AddTask::EmptyTitle => println!("{}", "Nothing added: the title is empty".dimmed()),
        AddTask::DuplicateOfLast => println!("{}", "Nothing added: same as your last task".dimmed()),
    }
}

/// Print tasks with their subtasks as checklists
pub fn print_task_list(entries: &[TaskEntry]) {
    if entries.is_empty() {
        println!("{}", "No tasks yet.".dimmed());
        return;
    }

    for entry in entries {
        println!(
            "{} {} {}",
            checkbox(entry.task.is_completed),
            entry.task.title.bold(),
            format_created(entry.task.created_at).dimmed()
        );
        for subtask in &entry.subtasks {
            println!("    {} {}", checkbox(subtask.is_completed), subtask.title);
        }
    }
}

/// Local date and time for a millisecond timestamp
pub fn format_created(created_at_ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(created_at_ms) {
        Some(utc) => utc.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}

fn checkbox(done: bool) -> String {
    if done { "☑".green().to_string() } else { "☐".normal().to_string() }
}
