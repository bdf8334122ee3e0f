//! Project and namespace endpoints

use crate::error::Result;
use crate::{GitLabClient, TOKEN_HEADER};
use forgeline_core::domain::blueprint::Visibility;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A GitLab project as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    pub http_url_to_repo: String,
    pub web_url: String,
    /// True until the first push lands
    #[serde(default)]
    pub empty_repo: bool,
}

/// A user or group namespace
#[derive(Debug, Clone, Deserialize)]
pub struct Namespace {
    pub id: u64,
    pub full_path: String,
}

/// Request body for project creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateProject {
    pub name: String,
    pub path: String,
    pub description: String,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
    pub initialize_with_readme: bool,
}

impl CreateProject {
    /// Creates a request with `path` equal to `name` and no README
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            description: String::new(),
            visibility,
            namespace_id: None,
            initialize_with_readme: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_namespace(mut self, namespace_id: u64) -> Self {
        self.namespace_id = Some(namespace_id);
        self
    }
}

impl GitLabClient {
    /// Get a project by its full path
    ///
    /// # Arguments
    /// * `full_path` - `namespace/name`
    ///
    /// # Returns
    /// The project, or `None` if it does not exist
    pub async fn get_project(&self, full_path: &str) -> Result<Option<Project>> {
        let url = self.api_url(&["projects", full_path])?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        self.handle_optional_response(response).await
    }

    /// Get a namespace by its full path
    ///
    /// # Returns
    /// The namespace, or `None` if it does not exist or is not visible to the token
    pub async fn get_namespace(&self, full_path: &str) -> Result<Option<Namespace>> {
        let url = self.api_url(&["namespaces", full_path])?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        self.handle_optional_response(response).await
    }

    /// Create a new project
    ///
    /// # Returns
    /// The created project
    pub async fn create_project(&self, req: &CreateProject) -> Result<Project> {
        let url = self.api_url(&["projects"])?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, &self.token)
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
