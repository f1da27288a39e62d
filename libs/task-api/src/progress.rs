//! Mapping from task status to a named phase and a canonical progress value.
//!
//! These numbers are a presentation aid. A snapshot that carries its own
//! `progress_percentage` should be shown with that value instead, see
//! [`snapshot_progress`].

use crate::types::task::{TaskStatus, TaskStatusSnapshot};

/// Every known status with its label and canonical percentage, happy path first.
pub const PHASES: [(TaskStatus, &str, u8); 10] = [
    (TaskStatus::Pending, "Task Created", 0),
    (TaskStatus::GitSync, "Git Sync", 10),
    (TaskStatus::Planning, "Generating Plan", 30),
    (TaskStatus::AwaitingApproval, "Awaiting Approval", 40),
    (TaskStatus::Approved, "Plan Approved", 45),
    (TaskStatus::InProgress, "Implementing Code", 60),
    (TaskStatus::Testing, "Running Tests", 80),
    (TaskStatus::Completed, "Completed", 100),
    (TaskStatus::Failed, "Failed", 0),
    (TaskStatus::Rejected, "Rejected", 0),
];

const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProgress {
    pub label: &'static str,
    pub percentage: u8,
}

/// Looks up the phase of `status`. Anything missing from [`PHASES`] yields 0%.
pub fn derive_phase_progress(status: TaskStatus) -> PhaseProgress {
    PHASES
        .iter()
        .find(|(s, _, _)| *s == status)
        .map(|&(_, label, percentage)| PhaseProgress { label, percentage })
        .unwrap_or(PhaseProgress {
            label: UNKNOWN_LABEL,
            percentage: 0,
        })
}

/// Progress to display for a snapshot: the server's figure if it sent one.
pub fn snapshot_progress(snapshot: &TaskStatusSnapshot) -> PhaseProgress {
    let derived = derive_phase_progress(snapshot.status);
    match snapshot.progress_percentage {
        Some(reported) => PhaseProgress {
            percentage: reported.min(100),
            ..derived
        },
        None => derived,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineStep {
    pub status: TaskStatus,
    pub label: &'static str,
    pub state: StepState,
}

/// The happy-path phases annotated relative to `status`.
///
/// A task that failed, was rejected or is in an unknown state has no current
/// step; every phase is then reported as upcoming.
pub fn timeline(status: TaskStatus) -> Vec<TimelineStep> {
    let current = status.lifecycle_index();
    TaskStatus::LIFECYCLE
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let state = match current {
                Some(current) if index < current => StepState::Done,
                Some(current) if index == current => StepState::Current,
                _ => StepState::Upcoming,
            };
            TimelineStep {
                status: *step,
                label: derive_phase_progress(*step).label,
                state,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_percentages() {
        let expected = [
            (TaskStatus::Pending, 0),
            (TaskStatus::GitSync, 10),
            (TaskStatus::Planning, 30),
            (TaskStatus::AwaitingApproval, 40),
            (TaskStatus::Approved, 45),
            (TaskStatus::InProgress, 60),
            (TaskStatus::Testing, 80),
            (TaskStatus::Completed, 100),
            (TaskStatus::Failed, 0),
            (TaskStatus::Rejected, 0),
        ];
        for (status, percentage) in expected {
            assert_eq!(derive_phase_progress(status).percentage, percentage, "{status}");
        }
    }

    #[test]
    fn failed_and_rejected_keep_distinct_labels() {
        assert_eq!(derive_phase_progress(TaskStatus::Failed).label, "Failed");
        assert_eq!(derive_phase_progress(TaskStatus::Rejected).label, "Rejected");
    }

    #[test]
    fn unknown_status_falls_back_to_zero() {
        let progress = derive_phase_progress(TaskStatus::Unknown);
        assert_eq!(progress.percentage, 0);
        assert_eq!(progress.label, "Unknown");
        assert_eq!(progress, derive_phase_progress(TaskStatus::Unknown));
    }

    #[test]
    fn happy_path_is_monotonic() {
        let percentages: Vec<u8> = TaskStatus::LIFECYCLE
            .iter()
            .map(|s| derive_phase_progress(*s).percentage)
            .collect();
        assert!(percentages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn reported_progress_wins_and_is_clamped() {
        let mut snapshot = TaskStatusSnapshot {
            id: "t1".into(),
            status: TaskStatus::InProgress,
            current_step: "Writing code".into(),
            progress_percentage: Some(72),
            logs: vec![],
            plan_available: true,
            report_available: false,
            error_message: None,
        };
        assert_eq!(snapshot_progress(&snapshot).percentage, 72);
        assert_eq!(snapshot_progress(&snapshot).label, "Implementing Code");

        snapshot.progress_percentage = Some(250);
        assert_eq!(snapshot_progress(&snapshot).percentage, 100);

        snapshot.progress_percentage = None;
        assert_eq!(snapshot_progress(&snapshot).percentage, 60);
    }

    #[test]
    fn timeline_marks_current_step() {
        let steps = timeline(TaskStatus::AwaitingApproval);
        assert_eq!(steps.len(), 8);
        assert!(steps[..3].iter().all(|s| s.state == StepState::Done));
        assert_eq!(steps[3].state, StepState::Current);
        assert!(steps[4..].iter().all(|s| s.state == StepState::Upcoming));
    }

    #[test]
    fn timeline_has_no_current_step_after_rejection() {
        assert!(timeline(TaskStatus::Rejected)
            .iter()
            .all(|s| s.state == StepState::Upcoming));
    }
}
