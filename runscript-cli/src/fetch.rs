//! Pipeline lookup and job output retrieval

use anyhow::{Context, Result, anyhow};
use colored::*;
use runscript_client::{ClientError, GitLabClient, ProjectRef};
use runscript_core::dto::job::Job;
use runscript_core::dto::pipeline::CiStatus;
use tracing::{debug, warn};

use crate::config::Config;
use crate::render;

/// What happened to the selected jobs
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Jobs whose name matched the configured job name
    pub matched: usize,
    /// Matched jobs whose trace could not be read
    pub failed: usize,
}

impl FetchSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record_trace(&mut self, readable: bool) {
        self.matched += 1;
        if !readable {
            self.failed += 1;
        }
    }
}

/// Whether the process should exit with status 0
pub fn succeeded(outcome: &Result<FetchSummary>) -> bool {
    matches!(outcome, Ok(summary) if summary.is_success())
}

/// Prints the pipeline, its jobs and the output of the configured job
///
/// Lookup failures are returned as errors. A trace that cannot be read is
/// reported inline and counted in the summary.
pub async fn fetch(
    client: &GitLabClient,
    config: &Config,
    pipeline_id: u64,
    output_only: bool,
) -> Result<FetchSummary> {
    let project = client
        .get_project(&config.project)
        .await
        .map_err(|e| lookup_failure(format!("project {}", config.project), e))?;
    debug!(project_id = project.id, "Project resolved");
    let project = ProjectRef::Id(project.id);

    let pipeline = client
        .get_pipeline(&project, pipeline_id)
        .await
        .map_err(|e| lookup_failure(format!("pipeline {}", pipeline_id), e))?;

    println!();
    for (label, value) in render::pipeline_summary(&pipeline) {
        let value = if label == "Status" {
            value.color(status_color(pipeline.status))
        } else {
            value.normal()
        };
        println!("{}: {}", label.bold(), value);
    }

    let jobs = client
        .list_pipeline_jobs(&project, pipeline_id)
        .await
        .with_context(|| format!("Failed to list jobs of pipeline {}", pipeline_id))?;

    println!();
    println!("{}", format!("Jobs ({}):", jobs.len()).bold());
    println!("{}", render::table_rule());
    for job in &jobs {
        println!("{}", render::job_row(job).color(status_color(job.status)));
    }

    println!();
    let heading = render::output_heading(pipeline_id, output_only);
    println!("{}", heading.cyan().bold());
    println!("{}", render::header_rule());

    let mut summary = FetchSummary::default();
    for job in select_jobs(&jobs, &config.job_name) {
        println!();
        println!("{} {}", "▸".cyan(), render::job_heading(job).bold());
        println!("{}", render::job_rule());

        let trace = client.get_job_trace(&project, job.id).await;
        summary.record_trace(trace.is_ok());
        match &trace {
            Ok(trace) => println!("{}", render::job_output(trace, output_only)),
            Err(e) => {
                warn!(job_id = job.id, "Failed to read job trace: {}", e);
                println!("{} {}", "Could not retrieve output:".red(), e);
            }
        }

        println!("{}", render::job_rule());
    }

    if summary.matched == 0 {
        let notice = format!(
            "No job named {} in pipeline {}",
            config.job_name, pipeline_id
        );
        println!("{}", notice.yellow());
    }

    Ok(summary)
}

/// Error reported when the project or pipeline cannot be read
fn lookup_failure(subject: String, error: ClientError) -> anyhow::Error {
    if error.is_unauthorized() {
        anyhow!(
            "GitLab rejected the access token while reading {} (check GITLAB_ACCESS_TOKEN)",
            subject
        )
    } else if error.is_not_found() {
        anyhow!("{} not found", subject)
    } else {
        anyhow::Error::new(error).context(format!("Failed to read {}", subject))
    }
}

/// Jobs named exactly `job_name`, in listing order
pub fn select_jobs<'a>(jobs: &'a [Job], job_name: &'a str) -> impl Iterator<Item = &'a Job> {
    jobs.iter().filter(move |job| job.name == job_name)
}

/// Colour for a CI status in human-facing output
pub fn status_color(status: CiStatus) -> Color {
    match status {
        CiStatus::Success => Color::Green,
        CiStatus::Failed | CiStatus::Canceled => Color::Red,
        CiStatus::Running | CiStatus::Pending | CiStatus::Preparing => Color::Cyan,
        CiStatus::Manual | CiStatus::Scheduled | CiStatus::WaitingForResource => Color::Yellow,
        _ => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs() -> Vec<Job> {
        serde_json::from_str(
            r#"[
                { "id": 11, "name": "request_prod", "stage": "request", "status": "success" },
                { "id": 12, "name": "runscript_prod", "stage": "run", "status": "failed" },
                { "id": 13, "name": "runscript_prod", "stage": "run", "status": "success" },
                { "id": 14, "name": "runscript_prod_retry", "stage": "run", "status": "skipped" }
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_select_jobs_matches_exact_name() {
        let jobs = jobs();
        let ids: Vec<u64> = select_jobs(&jobs, "runscript_prod").map(|j| j.id).collect();
        assert_eq!(ids, vec![12, 13]);
    }

    #[test]
    fn test_select_jobs_without_match() {
        let jobs = jobs();
        assert_eq!(select_jobs(&jobs, "runscript_uat").count(), 0);
    }

    #[test]
    fn test_summary_counts_unreadable_traces() {
        let mut summary = FetchSummary::default();
        assert!(summary.is_success());

        summary.record_trace(true);
        assert!(summary.is_success());

        summary.record_trace(false);
        summary.record_trace(true);
        assert_eq!(
            summary,
            FetchSummary {
                matched: 3,
                failed: 1
            }
        );
        assert!(!summary.is_success());
    }

    #[test]
    fn test_exit_status() {
        assert!(succeeded(&Ok(FetchSummary::default())));
        assert!(succeeded(&Ok(FetchSummary {
            matched: 1,
            failed: 0
        })));
        assert!(!succeeded(&Ok(FetchSummary {
            matched: 2,
            failed: 1
        })));
        assert!(!succeeded(&Err(anyhow!("pipeline 5 not found"))));
    }

    #[test]
    fn test_lookup_failure_messages() {
        let missing = lookup_failure(
            "pipeline 5".into(),
            ClientError::api_error(404, "Not found"),
        );
        assert_eq!(missing.to_string(), "pipeline 5 not found");

        let rejected = lookup_failure(
            "project 42".into(),
            ClientError::api_error(401, "401 Unauthorized"),
        );
        assert!(rejected.to_string().contains("rejected the access token"));
        assert!(rejected.to_string().contains("project 42"));

        let err = lookup_failure(
            "pipeline 5".into(),
            ClientError::api_error(502, "Bad Gateway"),
        );
        assert_eq!(err.to_string(), "Failed to read pipeline 5");
        assert!(format!("{:#}", err).contains("status 502"));
    }

    #[test]
    fn test_status_color() {
        assert_eq!(status_color(CiStatus::Success), Color::Green);
        assert_eq!(status_color(CiStatus::Failed), Color::Red);
        assert_eq!(status_color(CiStatus::Manual), Color::Yellow);
        assert_eq!(status_color(CiStatus::Unknown), Color::White);
    }
}
