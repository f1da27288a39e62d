use std::time::Duration;

use anyhow::bail;
use task_api::progress::snapshot_progress;
use task_api::types::task::{TaskStatus, TaskStatusSnapshot};
use task_api::{ClientError, PollEvent, PollOutcome};

use crate::context::Context;
use crate::render::{progress_bar, LogFollower};

/// Follows a task until it turns terminal or the user presses Ctrl-C.
pub async fn watch(ctx: &Context, task_id: &str, interval: Option<Duration>) -> anyhow::Result<()> {
    let interval = interval.unwrap_or(ctx.poll_interval);
    log::debug!("Watching task {task_id} every {interval:?}");

    let mut view = WatchView::new(task_id, ctx.json);
    let handle = ctx.client.start_polling(task_id, interval, move |event| {
        for line in view.update(event) {
            match line {
                Line::Out(text) => println!("{text}"),
                Line::Err(text) => eprintln!("{text}"),
            }
        }
    })?;

    let outcome = tokio::select! {
        outcome = handle.finished() => outcome,
        _ = tokio::signal::ctrl_c() => PollOutcome::Cancelled,
    };

    match conclude(task_id, outcome)? {
        Line::Out(text) if !ctx.json => println!("{text}"),
        Line::Out(_) => {}
        Line::Err(text) => eprintln!("{text}"),
    }
    Ok(())
}

/// Final message of a watch. A task that did not complete is an error, so the
/// exit status tells scripts whether the work landed.
fn conclude(task_id: &str, outcome: PollOutcome) -> anyhow::Result<Line> {
    match outcome {
        PollOutcome::Finished(TaskStatus::Completed) => Ok(Line::Out(format!(
            "Task {task_id} completed. Read the report with `conductor report {task_id}`."
        ))),
        PollOutcome::Finished(TaskStatus::Failed) => bail!("Task {task_id} failed"),
        PollOutcome::Finished(TaskStatus::Rejected) => bail!("Task {task_id} was rejected"),
        PollOutcome::Finished(status) => bail!("Task {task_id} ended as {status}"),
        PollOutcome::NotFound => bail!("Task {task_id} not found"),
        PollOutcome::Cancelled => Ok(Line::Err(format!(
            "Stopped watching. Task {task_id} keeps running on the server."
        ))),
    }
}

#[derive(Debug, PartialEq)]
enum Line {
    Out(String),
    Err(String),
}

/// Turns a stream of poll events into terminal output, printing only what
/// changed since the previous snapshot.
struct WatchView {
    task_id: String,
    json: bool,
    shown: Option<(TaskStatus, u8, String)>,
    logs: LogFollower,
    failing: bool,
}

impl WatchView {
    fn new(task_id: &str, json: bool) -> Self {
        Self {
            task_id: task_id.to_owned(),
            json,
            shown: None,
            logs: LogFollower::default(),
            failing: false,
        }
    }

    fn update(&mut self, event: PollEvent) -> Vec<Line> {
        match event {
            PollEvent::Snapshot(snapshot) => self.snapshot(&snapshot),
            PollEvent::Error(err) => self.error(&err).into_iter().collect(),
        }
    }

    fn snapshot(&mut self, snapshot: &TaskStatusSnapshot) -> Vec<Line> {
        let mut lines = Vec::new();
        if std::mem::take(&mut self.failing) {
            lines.push(Line::Err("Connection restored.".to_owned()));
        }
        if self.json {
            match serde_json::to_string(snapshot) {
                Ok(text) => lines.push(Line::Out(text)),
                Err(err) => log::error!("Failed to encode snapshot: {err}"),
            }
            return lines;
        }

        let progress = snapshot_progress(snapshot);
        let key = (
            snapshot.status,
            progress.percentage,
            snapshot.current_step.clone(),
        );
        let status_changed =
            self.shown.as_ref().map(|(status, _, _)| *status) != Some(snapshot.status);
        if self.shown.as_ref() != Some(&key) {
            let mut line = format!("{} {}", progress_bar(progress.percentage), progress.label);
            if !snapshot.current_step.is_empty() {
                line.push_str(&format!(": {}", snapshot.current_step));
            }
            lines.push(Line::Out(line));
            self.shown = Some(key);
        }

        lines.extend(
            self.logs
                .unseen(&snapshot.logs)
                .iter()
                .map(|log| Line::Out(format!("  | {log}"))),
        );

        if status_changed {
            if snapshot.status.needs_approval() {
                let id = &self.task_id;
                lines.push(Line::Out(format!(
                    "The plan is ready for review: `conductor plan {id}`, then `conductor approve {id}`, `conductor revise {id}` or `conductor reject {id}`."
                )));
            }
            if let Some(error) = &snapshot.error_message {
                lines.push(Line::Err(format!("Error: {error}")));
            }
        }
        lines
    }

    /// Transport trouble is reported once per outage. An unknown task is left
    /// to the session outcome.
    fn error(&mut self, err: &ClientError) -> Option<Line> {
        if err.is_not_found() || self.failing {
            return None;
        }
        self.failing = true;
        Some(Line::Err(format!("Could not refresh status ({err}), retrying.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: TaskStatus, step: &str, logs: &[&str]) -> TaskStatusSnapshot {
        TaskStatusSnapshot {
            id: "t1".into(),
            status,
            current_step: step.into(),
            progress_percentage: None,
            logs: logs.iter().map(|l| l.to_string()).collect(),
            plan_available: false,
            report_available: false,
            error_message: None,
        }
    }

    fn out(lines: &[Line]) -> Vec<&str> {
        lines
            .iter()
            .filter_map(|line| match line {
                Line::Out(text) => Some(text.as_str()),
                Line::Err(_) => None,
            })
            .collect()
    }

    #[test]
    fn repeats_nothing_when_nothing_changed() {
        let mut view = WatchView::new("t1", false);
        let first = view.snapshot(&snapshot(TaskStatus::Planning, "Reading code", &["cloned"]));
        assert_eq!(first.len(), 2);
        assert!(out(&first)[0].ends_with("Generating Plan: Reading code"));
        assert_eq!(out(&first)[1], "  | cloned");

        let again = view.snapshot(&snapshot(TaskStatus::Planning, "Reading code", &["cloned"]));
        assert!(again.is_empty());

        let more = view.snapshot(&snapshot(
            TaskStatus::Planning,
            "Reading code",
            &["cloned", "drafting"],
        ));
        assert_eq!(out(&more), ["  | drafting"]);
    }

    #[test]
    fn approval_hint_is_shown_once() {
        let mut view = WatchView::new("t1", false);
        let lines = view.snapshot(&snapshot(TaskStatus::AwaitingApproval, "", &[]));
        assert!(out(&lines).iter().any(|l| l.contains("conductor approve t1")));

        let lines = view.snapshot(&snapshot(TaskStatus::AwaitingApproval, "", &[]));
        assert!(lines.is_empty());
    }

    #[test]
    fn failure_message_goes_to_stderr() {
        let mut view = WatchView::new("t1", false);
        let mut failed = snapshot(TaskStatus::Failed, "", &[]);
        failed.error_message = Some("tests failed".into());
        let lines = view.snapshot(&failed);
        assert!(lines.contains(&Line::Err("Error: tests failed".to_owned())));
    }

    #[test]
    fn outages_are_reported_once() {
        let mut view = WatchView::new("t1", false);
        let err = ClientError::Validation("boom".into());
        assert!(view.error(&err).is_some());
        assert!(view.error(&err).is_none());

        let lines = view.snapshot(&snapshot(TaskStatus::Testing, "", &[]));
        assert_eq!(lines[0], Line::Err("Connection restored.".to_owned()));
        assert!(view.error(&err).is_some());
    }

    #[test]
    fn unknown_task_is_left_to_the_outcome() {
        let mut view = WatchView::new("t1", false);
        let err = ClientError::NotFound {
            resource: "task t1".into(),
        };
        assert!(view.error(&err).is_none());
    }

    #[test]
    fn json_mode_prints_every_snapshot() {
        let mut view = WatchView::new("t1", true);
        for _ in 0..2 {
            let lines = view.snapshot(&snapshot(TaskStatus::Pending, "", &[]));
            assert_eq!(lines.len(), 1);
            let Line::Out(text) = &lines[0] else {
                panic!("expected stdout line");
            };
            let value: serde_json::Value = serde_json::from_str(text).unwrap();
            assert_eq!(value["status"], "pending");
        }
    }

    #[test]
    fn only_completion_is_success() {
        assert!(matches!(
            conclude("t1", PollOutcome::Finished(TaskStatus::Completed)),
            Ok(Line::Out(_))
        ));
        assert!(matches!(
            conclude("t1", PollOutcome::Cancelled),
            Ok(Line::Err(_))
        ));

        let rejected = conclude("t1", PollOutcome::Finished(TaskStatus::Rejected)).unwrap_err();
        assert_eq!(rejected.to_string(), "Task t1 was rejected");
        let failed = conclude("t1", PollOutcome::Finished(TaskStatus::Failed)).unwrap_err();
        assert_eq!(failed.to_string(), "Task t1 failed");
        assert!(conclude("t1", PollOutcome::NotFound).is_err());
    }
}
