//! Run tool configuration
//!
//! Defines the GitLab location, the browser endpoints and the stage timings
//! used by the monitor. Every value has a default; the environment only
//! overrides.

use std::path::PathBuf;
use std::time::Duration;

/// Default GitLab instance hosting the run-script project
pub const DEFAULT_GITLAB_URL: &str = "https://devops.nhc.sa";

/// Default project path on that instance
pub const DEFAULT_PROJECT_PATH: &str = "ejar3/devs/ejar3-run-script-tool";

/// Default remote-debugging endpoint of a locally running Chrome
pub const DEFAULT_CDP_URL: &str = "http://127.0.0.1:9222";

/// Extension appended to a script name when resolving it on disk
pub const SCRIPT_EXTENSION: &str = "rb";

/// Waits and attempt ceilings of every stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTimings {
    /// How long to wait for the browser to land on the pipeline page
    pub page_wait: Duration,

    /// How often the current URL is checked during `page_wait`
    pub url_poll: Duration,

    /// Wait for a stage badge by its primary id
    pub badge_wait: Duration,

    /// Wait for a stage badge by its substring fallback
    pub badge_fallback_wait: Duration,

    /// Default wait for any other element
    pub element_wait: Duration,

    /// Ceiling and spacing of request-stage polls
    pub request_attempts: u32,
    pub request_interval: Duration,

    /// Pause between locating the approve badge and reading its button
    pub approve_settle: Duration,

    /// Pause after triggering the run stage, before monitoring starts
    pub run_settle: Duration,

    /// Ceiling and spacing of completion polls
    pub completion_attempts: u32,
    pub completion_interval: Duration,

    /// Short pause after UI interactions that animate (dropdowns, scrolling)
    pub ui_settle: Duration,
}

impl Default for MonitorTimings {
    fn default() -> Self {
        Self {
            page_wait: Duration::from_secs(30),
            url_poll: Duration::from_secs(1),
            badge_wait: Duration::from_secs(20),
            badge_fallback_wait: Duration::from_secs(10),
            element_wait: Duration::from_secs(10),
            request_attempts: 10,
            request_interval: Duration::from_secs(5),
            approve_settle: Duration::from_secs(2),
            run_settle: Duration::from_secs(15),
            completion_attempts: 60,
            completion_interval: Duration::from_secs(10),
            ui_settle: Duration::from_secs(1),
        }
    }
}

/// Run tool configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// GitLab base URL without a trailing slash (e.g., "https://gitlab.com")
    pub gitlab_url: String,

    /// Project path on the GitLab instance (e.g., "group/sub/project")
    pub project_path: String,

    /// Directory holding the `<name>.rb` scripts
    pub scripts_dir: PathBuf,

    /// Chrome remote-debugging endpoint tried first
    pub cdp_url: String,

    /// Whether the launched fallback browser runs headless
    pub headless: bool,

    /// Environment suffix of the stage job names (`request_<suffix>`, ...)
    pub stage_suffix: String,

    /// Where to write the run trace as JSON, if anywhere
    pub trace_file: Option<PathBuf>,

    pub timings: MonitorTimings,
}

impl Config {
    /// Creates a new configuration with default browser settings and timings
    pub fn new(gitlab_url: impl Into<String>, project_path: impl Into<String>) -> Self {
        let gitlab_url = gitlab_url.into();
        Self {
            gitlab_url: gitlab_url.trim_end_matches('/').to_string(),
            project_path: project_path.into().trim_matches('/').to_string(),
            scripts_dir: PathBuf::from("scripts"),
            cdp_url: DEFAULT_CDP_URL.to_string(),
            headless: false,
            stage_suffix: "prod".to_string(),
            trace_file: None,
            timings: MonitorTimings::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// A malformed value is an error; it never falls back to a default.
    ///
    /// Recognised environment variables (all optional):
    /// - RUNSCRIPT_GITLAB_URL (default: https://devops.nhc.sa)
    /// - RUNSCRIPT_PROJECT_PATH (default: ejar3/devs/ejar3-run-script-tool)
    /// - RUNSCRIPT_SCRIPTS_DIR (default: scripts)
    /// - RUNSCRIPT_CDP_URL (default: http://127.0.0.1:9222)
    /// - RUNSCRIPT_HEADLESS (true/false, default: false)
    /// - RUNSCRIPT_STAGE_SUFFIX (default: prod)
    /// - RUNSCRIPT_TRACE_FILE (unset by default)
    /// - RUNSCRIPT_COMPLETION_ATTEMPTS (default: 60)
    /// - RUNSCRIPT_COMPLETION_INTERVAL (seconds, default: 10)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = Self::new(
            get("RUNSCRIPT_GITLAB_URL").unwrap_or_else(|| DEFAULT_GITLAB_URL.to_string()),
            get("RUNSCRIPT_PROJECT_PATH").unwrap_or_else(|| DEFAULT_PROJECT_PATH.to_string()),
        );

        if let Some(dir) = get("RUNSCRIPT_SCRIPTS_DIR") {
            config.scripts_dir = PathBuf::from(dir);
        }

        if let Some(url) = get("RUNSCRIPT_CDP_URL") {
            config.cdp_url = url;
        }

        if let Some(value) = get("RUNSCRIPT_HEADLESS") {
            config.headless = parse_flag(&value).ok_or_else(|| {
                anyhow::anyhow!("RUNSCRIPT_HEADLESS must be true or false, got '{}'", value)
            })?;
        }

        if let Some(suffix) = get("RUNSCRIPT_STAGE_SUFFIX") {
            config.stage_suffix = suffix;
        }

        config.trace_file = get("RUNSCRIPT_TRACE_FILE").map(PathBuf::from);

        if let Some(value) = get("RUNSCRIPT_COMPLETION_ATTEMPTS") {
            config.timings.completion_attempts = value.trim().parse().map_err(|_| {
                anyhow::anyhow!(
                    "RUNSCRIPT_COMPLETION_ATTEMPTS must be a number, got '{}'",
                    value
                )
            })?;
        }

        if let Some(value) = get("RUNSCRIPT_COMPLETION_INTERVAL") {
            let secs: u64 = value.trim().parse().map_err(|_| {
                anyhow::anyhow!(
                    "RUNSCRIPT_COMPLETION_INTERVAL must be a number of seconds, got '{}'",
                    value
                )
            })?;
            config.timings.completion_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.gitlab_url.starts_with("http://") && !self.gitlab_url.starts_with("https://") {
            anyhow::bail!("gitlab_url must start with http:// or https://");
        }

        if self.project_path.is_empty() {
            anyhow::bail!("project_path cannot be empty");
        }

        if self.stage_suffix.is_empty() {
            anyhow::bail!("stage_suffix cannot be empty");
        }

        if self.cdp_url.is_empty() {
            anyhow::bail!("cdp_url cannot be empty");
        }

        if self.timings.request_attempts == 0 {
            anyhow::bail!("request_attempts must be greater than 0");
        }

        if self.timings.completion_attempts == 0 {
            anyhow::bail!("completion_attempts must be greater than 0");
        }

        Ok(())
    }

    /// Web URL of the project
    pub fn project_url(&self) -> String {
        format!("{}/{}", self.gitlab_url, self.project_path)
    }

    /// Page with the "run pipeline" form
    pub fn new_pipeline_url(&self) -> String {
        format!("{}/-/pipelines/new", self.project_url())
    }

    /// Prefix shared by every pipeline page of the project
    pub fn pipeline_url_prefix(&self) -> String {
        format!("{}/-/pipelines/", self.project_url())
    }

    /// Whether `url` is the detail page of a pipeline
    ///
    /// The form itself lives under the same prefix, so `/pipelines/new`
    /// does not count.
    pub fn is_pipeline_detail_url(&self, url: &str) -> bool {
        let Some(rest) = url.strip_prefix(&self.pipeline_url_prefix()) else {
            return false;
        };

        let segment = rest.split(['/', '?', '#']).next().unwrap_or_default();
        !segment.is_empty() && segment != "new"
    }

    /// On-disk location of the script called `name`
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.scripts_dir
            .join(format!("{}.{}", name, SCRIPT_EXTENSION))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_GITLAB_URL, DEFAULT_PROJECT_PATH)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
