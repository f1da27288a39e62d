use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::result::{ClientError, Result};
use crate::types::timestamp;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default)]
    pub plan_path: Option<String>,
    #[serde(default)]
    pub report_path: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Describes the first way in which this record breaks the life-cycle
    /// rules the server is supposed to uphold, if any.
    pub fn inconsistency(&self) -> Option<String> {
        let before_implementation = self.status.lifecycle_index().is_some()
            && !self.status.has_reached(TaskStatus::InProgress);
        if self.branch_name.is_some() && before_implementation {
            return Some(format!(
                "task {} has a branch while still {}",
                self.id, self.status
            ));
        }
        if self.error_message.is_some()
            && !matches!(self.status, TaskStatus::Failed | TaskStatus::Rejected)
        {
            return Some(format!(
                "task {} carries an error message while {}",
                self.id, self.status
            ));
        }
        None
    }
}

/// Life-cycle state of a task, as reported by the orchestration server.
///
/// The order of the variants up to `Completed` is the happy path. `Failed` and
/// `Rejected` can be reached from any non-terminal state. Values this client
/// does not know about deserialize to `Unknown`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    GitSync,
    Planning,
    AwaitingApproval,
    Approved,
    InProgress,
    Testing,
    Completed,
    Failed,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// The happy path, in order.
    pub const LIFECYCLE: [TaskStatus; 8] = [
        TaskStatus::Pending,
        TaskStatus::GitSync,
        TaskStatus::Planning,
        TaskStatus::AwaitingApproval,
        TaskStatus::Approved,
        TaskStatus::InProgress,
        TaskStatus::Testing,
        TaskStatus::Completed,
    ];

    /// No further automatic transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Rejected
        )
    }

    /// The only status that waits on a human decision.
    pub fn needs_approval(self) -> bool {
        self == TaskStatus::AwaitingApproval
    }

    /// Position on the happy path, `None` for deviations and unknown values.
    pub fn lifecycle_index(self) -> Option<usize> {
        Self::LIFECYCLE.iter().position(|s| *s == self)
    }

    /// Whether this status lies at or beyond `other` on the happy path.
    /// Deviations never count as having reached anything.
    pub fn has_reached(self, other: TaskStatus) -> bool {
        match (self.lifecycle_index(), other.lifecycle_index()) {
            (Some(current), Some(target)) => current >= target,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::GitSync => "git_sync",
            TaskStatus::Planning => "planning",
            TaskStatus::AwaitingApproval => "awaiting_approval",
            TaskStatus::Approved => "approved",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Testing => "testing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Payload to submit a new task.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewTask {
    pub project_id: String,
    pub description: String,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl NewTask {
    /// Shortest description the server accepts.
    pub const MIN_DESCRIPTION_LEN: usize = 10;

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(ClientError::validation("project id must not be empty"));
        }
        if self.description.trim().chars().count() < Self::MIN_DESCRIPTION_LEN {
            return Err(ClientError::validation(format!(
                "task description must be at least {} characters",
                Self::MIN_DESCRIPTION_LEN
            )));
        }
        Ok(())
    }
}

/// Point-in-time view of a task's progress. Every fetch yields a fresh one
/// that fully replaces the previous.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TaskStatusSnapshot {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub current_step: String,
    /// Server-reported progress. When present it wins over the derived value.
    #[serde(default, deserialize_with = "deserialize_percentage")]
    pub progress_percentage: Option<u8>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub plan_available: bool,
    #[serde(default)]
    pub report_available: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Any JSON number is rounded and clamped to 0..=100. Values that are not
/// numbers are dropped instead of failing the whole snapshot.
fn deserialize_percentage<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Reported {
        Number(f64),
        Other(IgnoredAny),
    }

    Ok(match Option::<Reported>::deserialize(deserializer)? {
        Some(Reported::Number(value)) if value.is_finite() => {
            Some(value.round().clamp(0.0, 100.0) as u8)
        }
        _ => None,
    })
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Plan {
    pub task_id: String,
    pub plan_content: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Report {
    pub task_id: String,
    pub report_content: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
}

/// A reviewer's answer to a plan that is awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Let the agent start implementing the plan.
    Approve,
    /// Send the plan back for revision with the given feedback.
    RequestChanges { feedback: String },
    /// Cancel the task.
    Reject,
}

/// Wire form of an [`ApprovalDecision`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl TryFrom<ApprovalDecision> for ApprovalRequest {
    type Error = ClientError;

    /// A change request without feedback would read as a rejection on the
    /// server, so it is refused here.
    fn try_from(decision: ApprovalDecision) -> Result<Self> {
        match decision {
            ApprovalDecision::Approve => Ok(ApprovalRequest {
                approved: true,
                feedback: None,
            }),
            ApprovalDecision::RequestChanges { feedback } => {
                let feedback = feedback.trim();
                if feedback.is_empty() {
                    return Err(ClientError::validation(
                        "feedback is required when requesting changes",
                    ));
                }
                Ok(ApprovalRequest {
                    approved: false,
                    feedback: Some(feedback.to_owned()),
                })
            }
            ApprovalDecision::Reject => Ok(ApprovalRequest {
                approved: false,
                feedback: None,
            }),
        }
    }
}
