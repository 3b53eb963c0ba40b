//! Pipeline run domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ref a pipeline run executes against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Development,
    #[default]
    Production,
    Test,
    Uat,
}

impl Branch {
    pub const ALL: [Branch; 4] = [
        Branch::Development,
        Branch::Production,
        Branch::Test,
        Branch::Uat,
    ];

    /// Position of this ref in the new-pipeline ref selector list
    pub fn option_index(self) -> usize {
        match self {
            Branch::Development => 4,
            Branch::Production => 5,
            Branch::Test => 6,
            Branch::Uat => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Development => "development",
            Branch::Production => "production",
            Branch::Test => "test",
            Branch::Uat => "uat",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a branch name is not one of the known refs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid branch '{0}' (expected one of: development, production, test, uat)")]
pub struct ParseBranchError(pub String);

impl FromStr for Branch {
    type Err = ParseBranchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Branch::Development),
            "production" => Ok(Branch::Production),
            "test" => Ok(Branch::Test),
            "uat" => Ok(Branch::Uat),
            _ => Err(ParseBranchError(s.to_string())),
        }
    }
}

/// One execution of the remote run-script job
///
/// Owned by the run tool for the duration of a single invocation. The
/// pipeline id is unknown at submission time and can only be recorded once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub branch: Branch,
    pub ticket_label: String,
    pub script_body: String,
    pub service_name: String,
    pipeline_id: Option<u64>,
}

impl PipelineRun {
    pub fn new(
        branch: Branch,
        ticket_label: impl Into<String>,
        script_body: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            branch,
            ticket_label: ticket_label.into(),
            script_body: script_body.into(),
            service_name: service_name.into(),
            pipeline_id: None,
        }
    }

    pub fn pipeline_id(&self) -> Option<u64> {
        self.pipeline_id
    }

    /// Records the discovered pipeline id
    ///
    /// Returns `false` and leaves the run untouched when an id is already set.
    pub fn record_pipeline_id(&mut self, id: u64) -> bool {
        if self.pipeline_id.is_some() {
            return false;
        }
        self.pipeline_id = Some(id);
        true
    }
}

/// Parses the numeric id from the final path segment of a pipeline URL
///
/// Query strings, fragments and a trailing slash are ignored.
pub fn pipeline_id_from_url(url: &str) -> Option<u64> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<u64>().ok())
}
