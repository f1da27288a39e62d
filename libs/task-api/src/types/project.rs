use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::{ClientError, Result};
use crate::types::timestamp;

/// A registered source repository that tasks are run against.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repository_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub main_branch: Option<String>,
    #[serde(default)]
    pub context: ProjectContext,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// Hints handed to the planner about how the repository is built.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_framework: Option<String>,
}

impl ProjectContext {
    pub fn is_empty(&self) -> bool {
        self == &ProjectContext::default()
    }
}

/// Payload to register a new project.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewProject {
    pub name: String,
    pub repository_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ProjectContext>,
}

impl NewProject {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClientError::validation("project name must not be empty"));
        }
        if self.repository_url.trim().is_empty() {
            return Err(ClientError::validation("repository URL must not be empty"));
        }
        Ok(())
    }
}

/// Splits a comma-separated list such as `"rust, axum,,tokio"` into its
/// non-empty, trimmed entries.
pub fn parse_tech_stack(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
