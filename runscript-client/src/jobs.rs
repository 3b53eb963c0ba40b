//! Job-related API endpoints

use crate::error::Result;
use crate::{GitLabClient, ProjectRef};

impl GitLabClient {
    // =============================================================================
    // Jobs
    // =============================================================================

    /// Get the raw log (trace) of a job
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub async fn get_job_trace(&self, project: &ProjectRef, job_id: u64) -> Result<String> {
        let url = self.api_url(&format!(
            "/projects/{}/jobs/{}/trace",
            project.to_path_segment(),
            job_id
        ));
        let response = self.get(&url).send().await?;

        self.handle_text_response(response).await
    }
}
