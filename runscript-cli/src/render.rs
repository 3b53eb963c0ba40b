//! Plain-text rendering of pipelines, jobs and job output
//!
//! Colouring is applied by the caller; everything here is plain text so the
//! layout can be tested.

use runscript_core::dto::job::Job;
use runscript_core::dto::pipeline::Pipeline;
use runscript_core::output::extract_output_content;

pub const NO_OUTPUT: &str = "No output available";

const TABLE_RULE: usize = 40;
const HEADER_RULE: usize = 60;
const JOB_RULE: usize = 50;

/// `Pipeline ID`, `Status`, `Ref`, `Created` and `User` lines
pub fn pipeline_summary(pipeline: &Pipeline) -> Vec<(&'static str, String)> {
    vec![
        ("Pipeline ID", pipeline.id.to_string()),
        ("Status", pipeline.status.to_string()),
        ("Ref", pipeline.git_ref.clone()),
        (
            "Created",
            pipeline
                .created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        (
            "User",
            pipeline
                .user
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_else(|| "N/A".to_string()),
        ),
    ]
}

pub fn job_row(job: &Job) -> String {
    format!("{} | {} | {}", job.name, job.stage, job.status)
}

pub fn job_heading(job: &Job) -> String {
    format!("Job: {} [{}] - {}", job.name, job.stage, job.status)
}

pub fn output_heading(pipeline_id: u64, output_only: bool) -> String {
    if output_only {
        format!("Script Output Content for Pipeline {}", pipeline_id)
    } else {
        format!("Full Script Output for Pipeline {}", pipeline_id)
    }
}

/// What gets printed for one job's trace
pub fn job_output(trace: &str, output_only: bool) -> &str {
    if trace.is_empty() {
        NO_OUTPUT
    } else if output_only {
        extract_output_content(trace)
    } else {
        trace
    }
}

pub fn table_rule() -> String {
    "-".repeat(TABLE_RULE)
}

pub fn header_rule() -> String {
    "=".repeat(HEADER_RULE)
}

pub fn job_rule() -> String {
    "-".repeat(JOB_RULE)
}
