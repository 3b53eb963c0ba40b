//! Configuration module
//!
//! Connection settings for the GitLab instance the fetch tool talks to.

use runscript_client::ProjectRef;

pub const DEFAULT_GITLAB_URL: &str = "https://devops.nhc.sa";
pub const DEFAULT_PROJECT: &str = "ejar3/devs/ejar3-run-script-tool";
pub const DEFAULT_JOB_NAME: &str = "runscript_prod";

/// Fetch tool configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the GitLab instance
    pub gitlab_url: String,
    /// Access token; anonymous access when absent
    pub token: Option<String>,
    /// Project holding the run-script pipelines
    pub project: ProjectRef,
    /// Only jobs with exactly this name have their trace printed
    pub job_name: String,
}

impl Config {
    pub fn new(
        gitlab_url: &str,
        token: Option<String>,
        project: &str,
        job_name: impl Into<String>,
    ) -> Self {
        Self {
            gitlab_url: gitlab_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            project: ProjectRef::parse(project),
            job_name: job_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_normalizes_inputs() {
        let config = Config::new(
            "https://gitlab.test/",
            Some("  ".into()),
            "42",
            DEFAULT_JOB_NAME,
        );

        assert_eq!(config.gitlab_url, "https://gitlab.test");
        assert!(config.token.is_none());
        assert_eq!(config.project, ProjectRef::Id(42));
        assert_eq!(config.job_name, "runscript_prod");
    }

    #[test]
    fn test_project_path_is_kept() {
        let config = Config::new(
            DEFAULT_GITLAB_URL,
            Some("glpat".into()),
            DEFAULT_PROJECT,
            "job",
        );

        assert_eq!(config.token.as_deref(), Some("glpat"));
        assert_eq!(
            config.project,
            ProjectRef::Path("ejar3/devs/ejar3-run-script-tool".to_string())
        );
    }
}
