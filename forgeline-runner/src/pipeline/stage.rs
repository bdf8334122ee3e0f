//! Stage contract

use async_trait::async_trait;
use forgeline_core::ExecutionState;

/// What a stage sees while it runs
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Simulate effects instead of performing them
    pub dry_run: bool,
    /// The run's checkpoint as of the start of this stage
    pub state: &'a ExecutionState,
    /// 1-based position of the stage in the pipeline
    pub position: usize,
    pub total: usize,
}

/// One named, ordered unit of pipeline work
///
/// The name is what the checkpoint records, so it must be unique within a
/// pipeline and stable across releases.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Performs the stage's work, or its simulation when `ctx.dry_run` is set
    async fn execute(&self, ctx: &StageContext<'_>) -> anyhow::Result<()>;
}
