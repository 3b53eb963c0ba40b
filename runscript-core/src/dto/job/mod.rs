//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::dto::pipeline::CiStatus;

/// A job as returned by `GET /projects/:id/pipelines/:pipeline_id/jobs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub status: CiStatus,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_list_deserializes() {
        let json = r#"[
            { "id": 11, "name": "request_prod", "stage": "request", "status": "success", "duration": 3.2 },
            { "id": 12, "name": "approve_prod", "stage": "approve", "status": "manual", "started_at": null },
            { "id": 13, "name": "runscript_prod", "stage": "run", "status": "running" }
        ]"#;

        let jobs: Vec<Job> = serde_json::from_str(json).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[1].status, CiStatus::Manual);
        assert_eq!(jobs[2].name, "runscript_prod");
        assert!(jobs[1].started_at.is_none());
    }
}
