//! Provision stage: plans or applies the module with the cloud provisioner

use crate::pipeline::{Stage, StageContext};
use crate::provider::{ProviderFactory, ProvisionRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use forgeline_core::Blueprint;
use std::sync::Arc;
use tracing::info;

pub const PROVISION_STAGE: &str = "provision";

pub struct ProvisionStage {
    blueprint: Arc<Blueprint>,
    factory: ProviderFactory,
    auto_approve: bool,
}

impl ProvisionStage {
    pub fn new(blueprint: Arc<Blueprint>, factory: ProviderFactory, auto_approve: bool) -> Self {
        Self {
            blueprint,
            factory,
            auto_approve,
        }
    }
}

#[async_trait]
impl Stage for ProvisionStage {
    fn name(&self) -> &str {
        PROVISION_STAGE
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<()> {
        let cloud = &self.blueprint.spec.cloud;

        if ctx.dry_run {
            info!(
                "DRY RUN: Would pull {} and run 'terraform init' and 'terraform plan'",
                self.factory.config().terraform_image
            );
            if self.auto_approve {
                info!(
                    "DRY RUN: Would run 'terraform apply -auto-approve' with the {} provider in {}",
                    cloud.provider, cloud.region
                );
            } else {
                info!("DRY RUN: Would validate only (no apply without auto-approve)");
            }
            return Ok(());
        }

        let provisioner = self.factory.provisioner(&cloud.provider).await?;
        let request = ProvisionRequest {
            working_dir: self.blueprint.spec.scaffold.destination.clone(),
            region: cloud.region.clone(),
            auto_approve: self.auto_approve,
            run_tag: ctx.state.short_run_id(),
        };

        provisioner
            .provision(&request)
            .await
            .context("Infrastructure provisioning failed")?;

        if self.auto_approve {
            info!(
                "Infrastructure provisioned with the {} provider in {}",
                cloud.provider, cloud.region
            );
        } else {
            info!("Infrastructure validated (use auto-approve to provision)");
        }
        Ok(())
    }
}
