//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pipeline as returned by `GET /projects/:id/pipelines/:pipeline_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    #[serde(default)]
    pub iid: Option<u64>,
    pub status: CiStatus,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// The user that triggered a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Status shared by pipelines and jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CiStatus::Created => "created",
            CiStatus::WaitingForResource => "waiting_for_resource",
            CiStatus::Preparing => "preparing",
            CiStatus::Pending => "pending",
            CiStatus::Running => "running",
            CiStatus::Success => "success",
            CiStatus::Failed => "failed",
            CiStatus::Canceled => "canceled",
            CiStatus::Skipped => "skipped",
            CiStatus::Manual => "manual",
            CiStatus::Scheduled => "scheduled",
            CiStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
