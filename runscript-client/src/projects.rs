//! Project-related API endpoints

use crate::GitLabClient;
use crate::error::Result;
use runscript_core::dto::project::Project;
use std::fmt;

/// Identifier of a project: either its numeric id or its full path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// Numeric project id
    Id(u64),
    /// Namespaced path such as `group/subgroup/project`
    Path(String),
}

impl ProjectRef {
    /// Parse a string into a ProjectRef
    ///
    /// Attempts to parse as a numeric id first, otherwise treats it as a path
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.parse::<u64>() {
            Ok(id) => ProjectRef::Id(id),
            Err(_) => ProjectRef::Path(input.trim_matches('/').to_string()),
        }
    }

    /// Encode the reference for use as the `:id` URL segment
    pub fn to_path_segment(&self) -> String {
        match self {
            ProjectRef::Id(id) => id.to_string(),
            ProjectRef::Path(path) => path.replace('/', "%2F"),
        }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRef::Id(id) => write!(f, "{}", id),
            ProjectRef::Path(path) => write!(f, "{}", path),
        }
    }
}

impl From<u64> for ProjectRef {
    fn from(id: u64) -> Self {
        ProjectRef::Id(id)
    }
}

impl From<&str> for ProjectRef {
    fn from(s: &str) -> Self {
        ProjectRef::parse(s)
    }
}

impl GitLabClient {
    // =============================================================================
    // Projects
    // =============================================================================

    /// Get a project by id or path
    ///
    /// Also serves as an access check for the configured token.
    pub async fn get_project(&self, project: &ProjectRef) -> Result<Project> {
        let url = self.api_url(&format!("/projects/{}", project.to_path_segment()));
        let response = self.get(&url).send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_id() {
        assert_eq!(ProjectRef::parse("55"), ProjectRef::Id(55));
        assert_eq!(ProjectRef::parse(" 55 ").to_path_segment(), "55");
    }

    #[test]
    fn test_parse_path_is_url_encoded() {
        let project = ProjectRef::parse("/ejar3/devs/ejar3-run-script-tool/");
        assert_eq!(
            project,
            ProjectRef::Path("ejar3/devs/ejar3-run-script-tool".to_string())
        );
        assert_eq!(
            project.to_path_segment(),
            "ejar3%2Fdevs%2Fejar3-run-script-tool"
        );
        assert_eq!(project.to_string(), "ejar3/devs/ejar3-run-script-tool");
    }
}
