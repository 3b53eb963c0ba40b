//! runscript-fetch
//!
//! Looks up a run-script pipeline through the GitLab API and prints its jobs
//! and the output of the script job.

mod config;
mod fetch;
mod render;

use clap::Parser;
use colored::*;
use runscript_client::GitLabClient;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DEFAULT_GITLAB_URL, DEFAULT_JOB_NAME, DEFAULT_PROJECT};

#[derive(Parser)]
#[command(name = "runscript-fetch")]
#[command(about = "Fetch a run-script pipeline and its script output", long_about = None)]
struct Cli {
    /// Pipeline ID
    #[arg(long)]
    pipeline_id: u64,

    /// Print only the OUTPUT CONTENT section of the job trace
    #[arg(long)]
    output_only: bool,

    /// Name of the job whose output is printed
    #[arg(long, default_value = DEFAULT_JOB_NAME)]
    job_name: String,

    /// GitLab base URL
    #[arg(long, env = "GITLAB_BASE_URL", default_value = DEFAULT_GITLAB_URL)]
    gitlab_url: String,

    /// GitLab access token
    #[arg(long, env = "GITLAB_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Project id or path (e.g., group/project)
    #[arg(long, env = "PROJECT_ID", default_value = DEFAULT_PROJECT)]
    project: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runscript_cli=warn,runscript_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::new(&cli.gitlab_url, cli.token, &cli.project, cli.job_name);
    let client = GitLabClient::new(config.gitlab_url.clone(), config.token.clone());

    let outcome = fetch::fetch(&client, &config, cli.pipeline_id, cli.output_only).await;
    if fetch::succeeded(&outcome) {
        return ExitCode::SUCCESS;
    }

    match outcome {
        Ok(summary) => eprintln!(
            "{} {} of {} job trace(s) could not be read",
            "✗".red().bold(),
            summary.failed,
            summary.matched
        ),
        Err(e) => eprintln!("{} {:#}", "✗".red().bold(), e),
    }
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_id_is_required() {
        assert!(Cli::try_parse_from(["runscript-fetch"]).is_err());
        assert!(Cli::try_parse_from(["runscript-fetch", "--pipeline-id", "abc"]).is_err());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "runscript-fetch",
            "--pipeline-id",
            "12345",
            "--output-only",
            "--job-name",
            "runscript_uat",
            "--gitlab-url",
            "https://gitlab.test",
            "--token",
            "glpat-xyz",
            "--project",
            "77",
        ])
        .unwrap();

        assert_eq!(cli.pipeline_id, 12345);
        assert!(cli.output_only);
        assert_eq!(cli.job_name, "runscript_uat");
        assert_eq!(cli.gitlab_url, "https://gitlab.test");
        assert_eq!(cli.token.as_deref(), Some("glpat-xyz"));
        assert_eq!(cli.project, "77");
    }

    #[test]
    fn test_command_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
