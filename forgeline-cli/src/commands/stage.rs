//! `forgeline scaffold | scm | provision`
//!
//! Runs one stage on its own, outside the checkpointed workflow.

use anyhow::Result;
use colored::*;
use forgeline_core::ExecutionState;
use forgeline_runner::stages::{ProvisionStage, ScaffoldStage, ScmStage};
use forgeline_runner::{Config, ProviderFactory, Stage, StageContext};
use std::path::Path;
use std::sync::Arc;

use crate::blueprint::load_blueprint;

/// The stages that can run on their own
#[derive(Debug, Clone, Copy)]
pub enum SingleStage {
    Scaffold,
    Scm,
    Provision,
}

/// Runs a single stage
///
/// # Arguments
/// * `which` - Stage to run
/// * `file` - Blueprint path
/// * `dry_run` - Simulate instead of acting
/// * `auto_approve` - Only used by the provision stage
/// * `config` - Runner configuration
pub async fn run_single_stage(
    which: SingleStage,
    file: &Path,
    dry_run: bool,
    auto_approve: bool,
    config: &Config,
) -> Result<()> {
    let blueprint = Arc::new(load_blueprint(file)?);
    let factory = ProviderFactory::new(config.clone());

    let stage: Box<dyn Stage> = match which {
        SingleStage::Scaffold => Box::new(ScaffoldStage::new(blueprint)),
        SingleStage::Scm => Box::new(ScmStage::new(blueprint, factory)),
        SingleStage::Provision => Box::new(ProvisionStage::new(blueprint, factory, auto_approve)),
    };

    let state = ExecutionState::new(file);
    let ctx = StageContext {
        dry_run,
        state: &state,
        position: 1,
        total: 1,
    };

    stage.execute(&ctx).await?;

    let message = if dry_run {
        format!("✓ {} simulation completed", stage.name())
    } else {
        format!("✓ {} completed", stage.name())
    };
    println!("{}", message.green().bold());
    Ok(())
}
