//! Concrete pipeline stages
//!
//! The workflow is always `scaffold`, then `scm`, then `provision`.

mod provision;
mod scaffold;
mod scm;

pub use provision::{PROVISION_STAGE, ProvisionStage};
pub use scaffold::{SCAFFOLD_STAGE, ScaffoldReport, ScaffoldStage, TFVARS_FILE, render_tfvars, scaffold};
pub use scm::{SCM_STAGE, ScmStage};

use crate::pipeline::Stage;
use crate::provider::ProviderFactory;
use forgeline_core::Blueprint;
use std::sync::Arc;

/// Builds the full workflow for a blueprint, in execution order
pub fn build_pipeline(
    blueprint: Arc<Blueprint>,
    factory: ProviderFactory,
    auto_approve: bool,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ScaffoldStage::new(Arc::clone(&blueprint))),
        Box::new(ScmStage::new(Arc::clone(&blueprint), factory.clone())),
        Box::new(ProvisionStage::new(blueprint, factory, auto_approve)),
    ]
}
