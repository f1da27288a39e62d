//! Plain-text views of tasks, snapshots and projects.

use task_api::progress::{self, StepState};
use task_api::types::project::Project;
use task_api::types::task::{Task, TaskStatus, TaskStatusSnapshot};

const BAR_WIDTH: usize = 30;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

pub fn progress_bar(percentage: u8) -> String {
    let percentage = usize::from(percentage.min(100));
    let filled = percentage * BAR_WIDTH / 100;
    format!(
        "[{}{}] {percentage:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

pub fn snapshot(snapshot: &TaskStatusSnapshot) -> String {
    let progress = progress::snapshot_progress(snapshot);
    let mut lines = vec![
        format!("{} ({})", progress.label, snapshot.status),
        progress_bar(progress.percentage),
    ];
    if !snapshot.current_step.is_empty() {
        lines.push(format!("Step: {}", snapshot.current_step));
    }
    let ready: Vec<&str> = [
        (snapshot.plan_available, "plan"),
        (snapshot.report_available, "report"),
    ]
    .into_iter()
    .filter_map(|(available, name)| available.then_some(name))
    .collect();
    if !ready.is_empty() {
        lines.push(format!("Available: {}", ready.join(", ")));
    }
    if let Some(error) = &snapshot.error_message {
        lines.push(format!("Error: {error}"));
    }
    lines.join("\n")
}

pub fn timeline(status: TaskStatus) -> String {
    let mut lines: Vec<String> = progress::timeline(status)
        .iter()
        .map(|step| {
            let marker = match step.state {
                StepState::Done => "[x]",
                StepState::Current => "[>]",
                StepState::Upcoming => "[ ]",
            };
            format!("  {marker} {}", step.label)
        })
        .collect();
    if matches!(status, TaskStatus::Failed | TaskStatus::Rejected) {
        lines.push(format!(
            "  [!] {}",
            progress::derive_phase_progress(status).label
        ));
    }
    lines.join("\n")
}

pub fn task(task: &Task) -> String {
    let phase = progress::derive_phase_progress(task.status);
    let mut lines = vec![
        format!("Task {}", task.id),
        format!("  Project:   {}", task.project_id),
        format!("  Status:    {} ({})", phase.label, task.status),
        format!("  Priority:  {}", task.priority),
    ];
    if let Some(branch) = &task.branch_name {
        lines.push(format!("  Branch:    {branch}"));
    }
    lines.push(format!("  Created:   {}", task.created_at.format(TIME_FORMAT)));
    lines.push(format!("  Updated:   {}", task.updated_at.format(TIME_FORMAT)));
    if let Some(completed) = task.completed_at {
        lines.push(format!("  Completed: {}", completed.format(TIME_FORMAT)));
    }
    if let Some(error) = &task.error_message {
        lines.push(format!("  Error:     {error}"));
    }
    lines.push(String::new());
    lines.extend(task.description.lines().map(|line| format!("    {line}")));
    lines.join("\n")
}

const SUMMARY_WIDTH: usize = 60;

pub fn task_row(task: &Task) -> String {
    let phase = progress::derive_phase_progress(task.status);
    let first_line = task.description.lines().next().unwrap_or_default();
    let mut summary: String = first_line.chars().take(SUMMARY_WIDTH).collect();
    if first_line.chars().count() > SUMMARY_WIDTH {
        summary.push_str("...");
    }
    format!(
        "{}  {:<17}  {:<6}  {summary}",
        task.id,
        phase.label,
        task.priority.to_string()
    )
}

pub fn project_row(project: &Project) -> String {
    format!("{}  {}  {}", project.id, project.name, project.repository_url)
}

pub fn project(project: &Project) -> String {
    let mut lines = vec![
        format!("Project {}", project.name),
        format!("  Id:          {}", project.id),
        format!("  Repository:  {}", project.repository_url),
    ];
    if let Some(branch) = &project.main_branch {
        lines.push(format!("  Branch:      {branch}"));
    }
    if let Some(path) = &project.local_path {
        lines.push(format!("  Checkout:    {path}"));
    }
    if let Some(description) = &project.description {
        lines.push(format!("  Description: {description}"));
    }
    let context = &project.context;
    if !context.tech_stack.is_empty() {
        lines.push(format!("  Tech stack:  {}", context.tech_stack.join(", ")));
    }
    if let Some(style) = &context.coding_style {
        lines.push(format!("  Style:       {style}"));
    }
    if let Some(framework) = &context.test_framework {
        lines.push(format!("  Tests:       {framework}"));
    }
    lines.push(format!("  Created:     {}", project.created_at.format(TIME_FORMAT)));
    lines.join("\n")
}

/// Remembers how many log lines were already shown.
#[derive(Debug, Default)]
pub struct LogFollower {
    shown: usize,
}

impl LogFollower {
    /// Lines of `logs` not printed yet. A log that shrank was replaced by the
    /// server and is shown again from the top.
    pub fn unseen<'a>(&mut self, logs: &'a [String]) -> &'a [String] {
        if logs.len() < self.shown {
            self.shown = 0;
        }
        let fresh = &logs[self.shown..];
        self.shown = logs.len();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(status: TaskStatus) -> TaskStatusSnapshot {
        TaskStatusSnapshot {
            id: "t1".into(),
            status,
            current_step: String::new(),
            progress_percentage: None,
            logs: vec![],
            plan_available: false,
            report_available: false,
            error_message: None,
        }
    }

    #[test]
    fn bar_is_proportional() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", "-".repeat(30)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(30)));
        assert_eq!(
            progress_bar(40),
            format!("[{}{}]  40%", "#".repeat(12), "-".repeat(18))
        );
    }

    #[test]
    fn snapshot_shows_phase_and_server_progress() {
        let mut snap = snapshot_with(TaskStatus::InProgress);
        snap.current_step = "Editing src/main.rs".into();
        snap.progress_percentage = Some(72);
        snap.plan_available = true;
        let text = snapshot(&snap);
        assert!(text.starts_with("Implementing Code (in_progress)\n"));
        assert!(text.contains(" 72%"));
        assert!(text.contains("Step: Editing src/main.rs"));
        assert!(text.contains("Available: plan"));
        assert!(!text.contains("Error:"));
    }

    #[test]
    fn failed_snapshot_shows_error() {
        let mut snap = snapshot_with(TaskStatus::Failed);
        snap.error_message = Some("tests did not pass".into());
        let text = snapshot(&snap);
        assert!(text.starts_with("Failed (failed)"));
        assert!(text.ends_with("Error: tests did not pass"));
    }

    #[test]
    fn timeline_markers() {
        let text = timeline(TaskStatus::Planning);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "  [x] Task Created");
        assert_eq!(lines[1], "  [x] Git Sync");
        assert_eq!(lines[2], "  [>] Generating Plan");
        assert_eq!(lines[7], "  [ ] Completed");
    }

    #[test]
    fn rejected_timeline_ends_with_marker() {
        let text = timeline(TaskStatus::Rejected);
        assert_eq!(text.lines().last(), Some("  [!] Rejected"));
        assert!(!text.contains("[>]"));
    }

    #[test]
    fn task_details() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "project_id": "p1",
            "description": "Add a health endpoint\nwith tests",
            "status": "testing",
            "priority": "high",
            "branch_name": "conductor/t1",
            "created_at": "2026-03-01T10:15:00",
            "updated_at": "2026-03-01T11:00:00Z"
        }))
        .unwrap();
        let text = super::task(&task);
        assert!(text.contains("Status:    Running Tests (testing)"));
        assert!(text.contains("Branch:    conductor/t1"));
        assert!(text.contains("Created:   2026-03-01 10:15 UTC"));
        assert!(text.ends_with("    Add a health endpoint\n    with tests"));
        assert!(!text.contains("Completed:"));
    }

    #[test]
    fn task_rows_use_the_first_description_line() {
        let long = "x".repeat(80);
        let task: Task = serde_json::from_value(json!({
            "id": "t7",
            "project_id": "p1",
            "description": format!("{long}\nsecond line"),
            "status": "awaiting_approval",
            "priority": "low",
            "created_at": "2026-03-01T10:15:00",
            "updated_at": "2026-03-01T10:15:00"
        }))
        .unwrap();
        let row = task_row(&task);
        assert!(row.starts_with("t7  Awaiting Approval  low     "));
        assert!(row.ends_with(&format!("{}...", "x".repeat(60))));
        assert!(!row.contains("second line"));
    }

    #[test]
    fn follower_prints_only_new_lines() {
        let mut follower = LogFollower::default();
        let mut logs = vec!["cloning".to_owned()];
        assert_eq!(follower.unseen(&logs), ["cloning"]);
        assert!(follower.unseen(&logs).is_empty());

        logs.push("planning".to_owned());
        assert_eq!(follower.unseen(&logs), ["planning"]);

        let replaced = vec!["restarted".to_owned()];
        assert_eq!(follower.unseen(&replaced), ["restarted"]);
    }
}
