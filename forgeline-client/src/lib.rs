//! Forgeline GitLab Client
//!
//! A small, typed HTTP client for the parts of the GitLab REST API the SCM
//! stage needs: namespace lookup, project lookup and project creation.
//!
//! # Example
//!
//! ```no_run
//! use forgeline_client::GitLabClient;
//!
//! #[tokio::main]
//! async fn main() -> forgeline_client::Result<()> {
//!     let client = GitLabClient::new("https://gitlab.com", "glpat-xxxx");
//!
//!     if let Some(project) = client.get_project("platform/network").await? {
//!         println!("Found project {}", project.web_url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod projects;

pub use error::{ClientError, Result};
pub use projects::{CreateProject, Namespace, Project};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

/// Header GitLab reads personal access tokens from
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// HTTP client for the GitLab v4 API
#[derive(Clone)]
pub struct GitLabClient {
    /// Base URL of the GitLab instance (e.g., "https://gitlab.com")
    base_url: String,
    /// Personal access token
    token: String,
    /// HTTP client instance
    client: Client,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    /// Create a new GitLab client
    ///
    /// # Arguments
    /// * `base_url` - The instance URL (e.g., "https://gitlab.com"), with or without `/api/v4`
    /// * `token` - Personal access token with `api` scope
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new GitLab client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, token: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/');
        let base_url = base_url.strip_suffix("/api/v4").unwrap_or(base_url);
        Self {
            base_url: base_url.to_string(),
            token: token.into(),
            client,
        }
    }

    /// Get the base URL of the instance
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token this client authenticates with
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Repository URL carrying this client's token, for `git push`
    ///
    /// GitLab accepts any username with a token as password; `oauth2` is
    /// the documented one. The result contains the secret and must not be
    /// logged.
    pub fn authenticated_url(&self, repo_url: &str) -> Result<Url> {
        let mut url = Url::parse(repo_url)
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid repository URL: {}", e)))?;
        url.set_username("oauth2")
            .and_then(|()| url.set_password(Some(&self.token)))
            .map_err(|()| ClientError::InvalidRequest(format!("Repository URL cannot carry credentials: {}", repo_url)))?;
        Ok(url)
    }

    /// Builds an API URL, percent-encoding each segment
    ///
    /// Segments may contain `/` (project paths); it is encoded as `%2F`.
    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/api/v4", self.base_url))
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest("Base URL cannot have a path".to_string()))?
            .extend(segments);
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Like `handle_response`, but maps 404 to `None`
    async fn handle_optional_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        match self.handle_response(response).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GitLabClient::new("https://gitlab.com", "token");
        assert_eq!(client.base_url(), "https://gitlab.com");
        assert_eq!(client.token(), "token");
    }

    #[test]
    fn test_client_trims_trailing_slash_and_api_suffix() {
        let client = GitLabClient::new("https://gitlab.example.com/", "t");
        assert_eq!(client.base_url(), "https://gitlab.example.com");

        let client = GitLabClient::new("https://gitlab.example.com/api/v4/", "t");
        assert_eq!(client.base_url(), "https://gitlab.example.com");
    }

    #[test]
    fn test_api_url_encodes_project_path() {
        let client = GitLabClient::new("https://gitlab.com", "t");
        let url = client.api_url(&["projects", "platform/network"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.com/api/v4/projects/platform%2Fnetwork"
        );
    }

    #[test]
    fn test_authenticated_url() {
        let client = GitLabClient::new("https://gitlab.com", "glpat-secret");
        let url = client
            .authenticated_url("https://gitlab.com/platform/network.git")
            .unwrap();
        assert_eq!(url.username(), "oauth2");
        assert_eq!(url.password(), Some("glpat-secret"));
        assert_eq!(url.path(), "/platform/network.git");

        assert!(client.authenticated_url("not a url").is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = GitLabClient::new("https://gitlab.com", "glpat-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("glpat-secret"));
    }
}
