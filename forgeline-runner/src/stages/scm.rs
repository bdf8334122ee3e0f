//! SCM stage: publishes the scaffolded module to source control

use crate::pipeline::{Stage, StageContext};
use crate::provider::{ProviderFactory, PublishOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use forgeline_core::Blueprint;
use std::sync::Arc;
use tracing::info;

pub const SCM_STAGE: &str = "scm";

pub struct ScmStage {
    blueprint: Arc<Blueprint>,
    factory: ProviderFactory,
}

impl ScmStage {
    pub fn new(blueprint: Arc<Blueprint>, factory: ProviderFactory) -> Self {
        Self { blueprint, factory }
    }
}

#[async_trait]
impl Stage for ScmStage {
    fn name(&self) -> &str {
        SCM_STAGE
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<()> {
        let spec = &self.blueprint.spec;
        let project = &spec.scm.project;

        if ctx.dry_run {
            info!(
                "DRY RUN: Would create {} repository '{}' in namespace '{}' ({})",
                spec.scm.provider, project.name, project.namespace, project.visibility
            );
            info!(
                "DRY RUN: Would push {} to the repository",
                spec.scaffold.destination.display()
            );
            return Ok(());
        }

        let provider = self.factory.scm_provider(&spec.scm)?;
        let outcome = provider
            .publish(&spec.scm, &spec.scaffold.destination)
            .await
            .with_context(|| format!("{} repository creation failed", spec.scm.provider))?;

        match outcome {
            PublishOutcome::Created { web_url } => info!("Repository created: {}", web_url),
            PublishOutcome::Completed { web_url } => {
                info!("Pushed to previously created empty repository: {}", web_url)
            }
            PublishOutcome::AlreadyExists { web_url } => {
                info!("Repository already existed, left unchanged: {}", web_url)
            }
        }
        Ok(())
    }
}
