//! Runscript GitLab Client
//!
//! A small, type-safe client for the parts of the GitLab API v4 the fetch
//! tool needs: project lookup, pipeline lookup, job listing and job traces.
//!
//! # Example
//!
//! ```no_run
//! use runscript_client::{GitLabClient, ProjectRef};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GitLabClient::new("https://devops.nhc.sa", Some("glpat-xxxx".into()));
//!     let project = ProjectRef::parse("ejar3/devs/ejar3-run-script-tool");
//!
//!     let pipeline = client.get_pipeline(&project, 98765).await?;
//!     println!("Pipeline {} is {}", pipeline.id, pipeline.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod pipelines;
mod projects;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use projects::ProjectRef;

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Header GitLab uses for personal/project access tokens
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Page size used when walking paginated collections
pub(crate) const PER_PAGE: u32 = 100;

/// HTTP client for the GitLab API v4
#[derive(Debug, Clone)]
pub struct GitLabClient {
    /// Base URL of the GitLab instance (e.g., "https://devops.nhc.sa")
    base_url: String,
    /// Access token sent with every request, if any
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl GitLabClient {
    /// Create a new GitLab client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the GitLab instance
    /// * `token` - Optional access token
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new GitLab client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        }
    }

    /// Get the base URL of the GitLab instance
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an API v4 URL from a path starting with `/`
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    /// Start an authenticated GET request
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        debug!("GET {}", url);
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response carrying plain text (e.g., job traces)
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let response = Self::check_status(response).await?;

        let bytes = response.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

/// Reads the `x-next-page` pagination header
///
/// GitLab sends an empty value on the last page.
pub(crate) fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u32>().ok())
}

/// Page to request after `current`, given the advertised next page
///
/// Stops on the last page and on a header that does not move forward.
pub(crate) fn following_page(current: u32, advertised: Option<u32>) -> Option<u32> {
    advertised.filter(|&next| next > current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_client_creation() {
        let client = GitLabClient::new("https://devops.nhc.sa", None);
        assert_eq!(client.base_url(), "https://devops.nhc.sa");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = GitLabClient::new("https://devops.nhc.sa/", None);
        assert_eq!(client.base_url(), "https://devops.nhc.sa");
        assert_eq!(
            client.api_url("/projects/55"),
            "https://devops.nhc.sa/api/v4/projects/55"
        );
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let client = GitLabClient::new("https://devops.nhc.sa", Some(String::new()));
        assert!(client.token.is_none());
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = GitLabClient::with_client("http://localhost:8929", None, http_client);
        assert_eq!(client.base_url(), "http://localhost:8929");
    }

    #[test]
    fn test_token_header_is_attached() {
        let client = GitLabClient::new("https://devops.nhc.sa", Some("glpat-abc".into()));
        let url = client.api_url("/projects/1");
        let request = client.get(&url).build().unwrap();
        assert_eq!(request.headers().get(TOKEN_HEADER).unwrap(), "glpat-abc");
    }

    #[test]
    fn test_next_page_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);

        headers.insert("x-next-page", HeaderValue::from_static(""));
        assert_eq!(next_page(&headers), None);

        headers.insert("x-next-page", HeaderValue::from_static("3"));
        assert_eq!(next_page(&headers), Some(3));
    }

    /// Pages visited when each response carries the given `x-next-page` value
    fn walk(responses: &[&'static str]) -> Vec<u32> {
        let mut visited = Vec::new();
        let mut page = 1;

        loop {
            visited.push(page);
            let mut headers = HeaderMap::new();
            if let Some(value) = responses.get(visited.len() - 1) {
                headers.insert("x-next-page", HeaderValue::from_static(value));
            }

            match following_page(page, next_page(&headers)) {
                Some(next) => page = next,
                None => break,
            }
        }

        visited
    }

    #[test]
    fn test_pagination_follows_every_page() {
        assert_eq!(walk(&["2", "3", ""]), vec![1, 2, 3]);
    }

    #[test]
    fn test_pagination_single_page() {
        assert_eq!(walk(&[""]), vec![1]);
        assert_eq!(walk(&[]), vec![1]);
    }

    #[test]
    fn test_pagination_stops_on_stale_header() {
        assert_eq!(walk(&["2", "2"]), vec![1, 2]);
        assert_eq!(walk(&["1"]), vec![1]);
        assert_eq!(walk(&["2", "garbage"]), vec![1, 2]);
    }
}
