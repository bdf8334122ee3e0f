//! External-system providers
//!
//! Providers are selected by the names a blueprint uses (`spec.scm.provider`,
//! `spec.cloud.provider`). Names parse into closed enums, so supporting a new
//! provider means adding a variant and handling it in [`ProviderFactory`].

mod gitlab;
mod terraform;

pub use gitlab::{GitLabProvider, TOKEN_ENV};
pub use terraform::{ProvisionRequest, TerraformProvisioner, phase_container_name};

use crate::config::Config;
use crate::engine::{ContainerRuntime, EngineRuntime, docker};
use anyhow::{Context, Result};
use async_trait::async_trait;
use forgeline_core::domain::blueprint::ScmConfig;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Result of publishing a module to source control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The project was created and the module pushed
    Created { web_url: String },
    /// The project existed without any commits and the module was pushed to it
    Completed { web_url: String },
    /// The project already existed with content; nothing was pushed
    AlreadyExists { web_url: String },
}

/// Source control provider
#[async_trait]
pub trait ScmProvider: Send + Sync {
    /// Creates the project described by `scm` and pushes `source_dir` to it
    ///
    /// An existing project with content is left untouched; an existing empty
    /// one, left behind by an interrupted publish, receives the push.
    async fn publish(&self, scm: &ScmConfig, source_dir: &Path) -> Result<PublishOutcome>;
}

/// Infrastructure provisioner
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Plans, and with `auto_approve` applies, the module in `request.working_dir`
    async fn provision(&self, request: &ProvisionRequest) -> Result<()>;
}

/// Supported source control providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmProviderKind {
    GitLab,
}

impl FromStr for ScmProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gitlab" => Ok(Self::GitLab),
            other => anyhow::bail!("unsupported SCM provider: {}", other),
        }
    }
}

impl fmt::Display for ScmProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitLab => f.write_str("gitlab"),
        }
    }
}

/// Supported cloud provisioners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionerKind {
    Aws,
}

impl FromStr for ProvisionerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            other => anyhow::bail!("unsupported provisioner: {}", other),
        }
    }
}

impl fmt::Display for ProvisionerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => f.write_str("aws"),
        }
    }
}

/// Builds providers on demand
///
/// The container engine is only contacted when a provisioner is requested,
/// so commands that never provision work without one.
#[derive(Clone)]
pub struct ProviderFactory {
    config: Config,
    runtime: Option<Arc<dyn ContainerRuntime>>,
}

impl ProviderFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runtime: None,
        }
    }

    /// Uses `runtime` instead of connecting to an engine
    pub fn with_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the SCM provider for `scm.provider`
    pub fn scm_provider(&self, scm: &ScmConfig) -> Result<Box<dyn ScmProvider>> {
        let kind: ScmProviderKind = scm.provider.parse()?;
        match kind {
            ScmProviderKind::GitLab => {
                let provider = GitLabProvider::from_config(scm)
                    .context("SCM provider initialization failed")?;
                Ok(Box::new(provider))
            }
        }
    }

    /// Creates the provisioner for a cloud provider name
    pub async fn provisioner(&self, cloud_provider: &str) -> Result<Box<dyn Provisioner>> {
        let kind: ProvisionerKind = cloud_provider.parse()?;
        match kind {
            ProvisionerKind::Aws => {
                let runtime = self.container_runtime().await?;
                let mut provisioner =
                    TerraformProvisioner::new(runtime, self.config.terraform_image.clone());
                if let Some(dir) = &self.config.aws_config_dir {
                    provisioner = provisioner.with_credentials_dir(dir);
                }
                Ok(Box::new(provisioner))
            }
        }
    }

    async fn container_runtime(&self) -> Result<Arc<dyn ContainerRuntime>> {
        if let Some(runtime) = &self.runtime {
            return Ok(Arc::clone(runtime));
        }

        let (_endpoint, engine) = docker::connect(&self.config)
            .await
            .context("Failed to connect to a container engine")?;
        Ok(Arc::new(EngineRuntime::new(
            Arc::new(engine),
            self.config.wait_timeout,
            self.config.remove_timeout,
        )))
    }
}
