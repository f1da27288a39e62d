use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Subcommand, ValueEnum};
use task_api::types::task::{NewTask, TaskPriority, TaskStatus};

use crate::cli::editor::Editor;
use crate::context::Context;
use crate::render;
use crate::util::write_document;

const DESCRIPTION_TEMPLATE: &str = "\n\n# Describe the task for the coding agent. Lines starting with '#' are ignored.\n# An empty description aborts.\n";

#[derive(Clone, Copy, ValueEnum)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<Priority> for TaskPriority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => TaskPriority::Low,
            Priority::Medium => TaskPriority::Medium,
            Priority::High => TaskPriority::High,
            Priority::Urgent => TaskPriority::Urgent,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Submit a new task to a project
    Create {
        /// Project the task belongs to
        #[clap(long)]
        project: String,
        /// Task description. Opens $EDITOR when omitted.
        #[clap(short = 'm')]
        message: Option<String>,
        #[clap(long, value_enum, default_value = "medium")]
        priority: Priority,
        /// Extra context handed to the agent
        #[clap(long)]
        context: Option<String>,
    },
    /// List tasks, optionally only those of one project
    List {
        #[clap(long)]
        project: Option<String>,
    },
    /// Show a task's details
    Show { task_id: String },
}

pub async fn run(ctx: &Context, command: TaskCommand) -> anyhow::Result<()> {
    match command {
        TaskCommand::Create {
            project,
            message,
            priority,
            context,
        } => {
            let description = match message {
                Some(message) => message,
                None => Editor::from_env()
                    .edit(DESCRIPTION_TEMPLATE)?
                    .ok_or(anyhow!("Empty task description, nothing submitted"))?,
            };
            let new_task = NewTask {
                project_id: project,
                description,
                priority: priority.into(),
                additional_context: context.filter(|c| !c.trim().is_empty()),
            };
            let task = ctx.client.create_task(&new_task).await?;
            if ctx.json {
                return ctx.print_json(&task);
            }
            println!("Submitted task {}", task.id);
            println!("Follow it with `conductor watch {}`", task.id);
        }
        TaskCommand::List { project } => {
            let tasks = ctx.client.list_tasks(project.as_deref()).await?;
            if ctx.json {
                return ctx.print_json(&tasks);
            }
            if tasks.is_empty() {
                println!("No tasks yet. Submit one with `conductor task create`.");
            }
            for task in &tasks {
                println!("{}", render::task_row(task));
            }
        }
        TaskCommand::Show { task_id } => {
            let task = ctx.client.get_task(&task_id).await?;
            if ctx.json {
                return ctx.print_json(&task);
            }
            println!("{}", render::task(&task));
        }
    }
    Ok(())
}

pub async fn status(ctx: &Context, task_id: &str) -> anyhow::Result<()> {
    let snapshot = ctx.client.fetch_status(task_id).await?;
    if ctx.json {
        return ctx.print_json(&snapshot);
    }
    println!("{}", render::snapshot(&snapshot));
    println!();
    println!("{}", render::timeline(snapshot.status));
    Ok(())
}

pub async fn plan(ctx: &Context, task_id: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(plan) = ctx.client.get_plan(task_id).await? else {
        println!("The plan for task {task_id} is not ready yet.");
        return Ok(());
    };
    if ctx.json {
        return ctx.print_json(&plan);
    }
    emit(&plan.plan_content, output, || default_filename("plan", task_id))?;
    if plan.status == TaskStatus::AwaitingApproval {
        eprintln!();
        eprintln!(
            "This plan awaits review: `conductor approve {task_id}`, `conductor revise {task_id}` or `conductor reject {task_id}`."
        );
    }
    Ok(())
}

pub async fn report(ctx: &Context, task_id: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(report) = ctx.client.get_report(task_id).await? else {
        println!("The report for task {task_id} is not ready yet.");
        return Ok(());
    };
    if ctx.json {
        return ctx.print_json(&report);
    }
    emit(&report.report_content, output, || {
        default_filename("report", task_id)
    })?;
    if let Some(branch) = &report.branch_name {
        eprintln!();
        match &report.commit_hash {
            Some(commit) => eprintln!("Changes are on branch {branch} at {commit}."),
            None => eprintln!("Changes are on branch {branch}."),
        }
    }
    Ok(())
}

/// Prints `content`, or saves it when an output path was given. A directory
/// receives the document under its default name.
fn emit(
    content: &str,
    output: Option<PathBuf>,
    filename: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    match output {
        None => println!("{content}"),
        Some(path) => {
            let path = if path.is_dir() {
                path.join(filename())
            } else {
                path
            };
            write_document(&path, content)?;
            println!("Saved to {}", path.display());
        }
    }
    Ok(())
}

/// Task ids come from the command line, so anything that could leave the
/// target directory is replaced.
fn default_filename(kind: &str, task_id: &str) -> String {
    let safe: String = task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{kind}-{safe}.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_saved_into_directory_get_default_name() {
        let dir = tempfile::tempdir().unwrap();
        emit(
            "# Plan",
            Some(dir.path().to_path_buf()),
            || default_filename("plan", "t1"),
        )
        .unwrap();
        let saved = std::fs::read_to_string(dir.path().join("plan-t1.md")).unwrap();
        assert_eq!(saved, "# Plan");
    }

    #[test]
    fn task_id_cannot_escape_output_directory() {
        assert_eq!(default_filename("plan", "../../x"), "plan-______x.md");
        assert_eq!(default_filename("report", "a/b\\c"), "report-a_b_c.md");
        assert_eq!(
            default_filename("plan", "0b6f4c1e-93aa-4d2e"),
            "plan-0b6f4c1e-93aa-4d2e.md"
        );

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        std::fs::create_dir(&target).unwrap();
        emit("# Plan", Some(target.clone()), || {
            default_filename("plan", "../escape")
        })
        .unwrap();
        assert!(target.join("plan-___escape.md").is_file());
        assert!(!dir.path().join("escape.md").exists());
    }

    #[test]
    fn explicit_file_path_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.md");
        emit("# Report", Some(path.clone()), || unreachable!()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report");
    }
}
