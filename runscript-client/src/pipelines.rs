//! Pipeline-related API endpoints

use crate::error::Result;
use crate::{GitLabClient, PER_PAGE, ProjectRef, following_page, next_page};
use runscript_core::dto::job::Job;
use runscript_core::dto::pipeline::Pipeline;
use tracing::debug;

impl GitLabClient {
    // =============================================================================
    // Pipelines
    // =============================================================================

    /// Get a pipeline by ID
    ///
    /// # Arguments
    /// * `project` - The project the pipeline belongs to
    /// * `pipeline_id` - The numeric pipeline id
    pub async fn get_pipeline(&self, project: &ProjectRef, pipeline_id: u64) -> Result<Pipeline> {
        let url = self.api_url(&format!(
            "/projects/{}/pipelines/{}",
            project.to_path_segment(),
            pipeline_id
        ));
        let response = self.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List every job of a pipeline, following pagination
    ///
    /// # Returns
    /// All jobs of the pipeline in the order GitLab returns them
    pub async fn list_pipeline_jobs(
        &self,
        project: &ProjectRef,
        pipeline_id: u64,
    ) -> Result<Vec<Job>> {
        let base = self.api_url(&format!(
            "/projects/{}/pipelines/{}/jobs",
            project.to_path_segment(),
            pipeline_id
        ));

        let mut jobs = Vec::new();
        let mut page = 1;

        loop {
            let url = format!("{}?per_page={}&page={}", base, PER_PAGE, page);
            let response = self.get(&url).send().await?;
            let advertised = next_page(response.headers());

            let batch: Vec<Job> = self.handle_response(response).await?;
            debug!("Fetched {} job(s) from page {}", batch.len(), page);
            jobs.extend(batch);

            match following_page(page, advertised) {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(jobs)
    }
}
