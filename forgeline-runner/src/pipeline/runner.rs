//! Stage runner
//!
//! Drives an ordered list of stages against a checkpoint store:
//! - stages at or before the checkpoint are skipped
//! - the checkpoint is saved after each successful stage
//! - the first failure stops the run without touching the checkpoint
//! - on success the checkpoint is removed, or kept with a terminal marker

use crate::error::PipelineError;
use crate::pipeline::stage::{Stage, StageContext};
use crate::pipeline::store::StateStore;
use forgeline_core::ExecutionState;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a run treats the checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMode {
    /// Stages simulate; the checkpoint is read but never written
    pub dry_run: bool,
    /// Keep the checkpoint, marked terminal, after a successful run
    pub retain_state: bool,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Whether an existing checkpoint was picked up
    pub resumed: bool,
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

/// Sequential executor of a fixed stage list
pub struct StageRunner {
    stages: Vec<Box<dyn Stage>>,
    store: StateStore,
}

impl std::fmt::Debug for StageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRunner")
            .field("stages", &self.stage_names())
            .field("store", &self.store)
            .finish()
    }
}

impl StageRunner {
    /// Creates a runner over `stages`, in execution order
    ///
    /// # Returns
    /// `PipelineError::DuplicateStage` if two stages share a name
    pub fn new(stages: Vec<Box<dyn Stage>>, store: StateStore) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.name()) {
                return Err(PipelineError::DuplicateStage(stage.name().to_string()));
            }
        }
        Ok(Self { stages, store })
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Number of leading stages a checkpoint marks as done
    fn completed_count(&self, state: &ExecutionState) -> Result<usize, PipelineError> {
        if state.terminal {
            return Ok(self.stages.len());
        }

        match state.last_completed_stage.as_deref() {
            None => Ok(0),
            Some(last) => self
                .stages
                .iter()
                .position(|s| s.name() == last)
                .map(|index| index + 1)
                .ok_or_else(|| PipelineError::UnknownCheckpointStage {
                    stage: last.to_string(),
                }),
        }
    }

    /// Runs the pipeline
    ///
    /// # Arguments
    /// * `source_path` - Workflow description recorded in a fresh checkpoint
    /// * `mode` - Dry-run and retention switches
    ///
    /// # Returns
    /// A report of what ran and what was skipped, or the first error
    pub async fn run(&self, source_path: &Path, mode: RunMode) -> Result<RunReport, PipelineError> {
        let _lock = if mode.dry_run {
            None
        } else {
            Some(self.store.lock()?)
        };

        let (mut state, resumed) = match self.store.load()? {
            Some(state) => (state, true),
            None => (ExecutionState::new(source_path), false),
        };

        if resumed && state.source_path != source_path {
            warn!(
                "Checkpoint was written for {}, now running {}",
                state.source_path.display(),
                source_path.display()
            );
        }

        let done = self.completed_count(&state)?;
        let total = self.stages.len();

        if resumed {
            info!(
                run_id = %state.run_id,
                "Resuming run after stage '{}' ({} of {} complete)",
                state.last_completed_stage.as_deref().unwrap_or("none"),
                done,
                total
            );
        } else {
            info!(run_id = %state.run_id, "Starting run of {} stage(s)", total);
        }

        let mut report = RunReport {
            run_id: state.run_id,
            resumed,
            executed: Vec::new(),
            skipped: Vec::new(),
            dry_run: mode.dry_run,
        };

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();

            if index < done {
                info!("Skipping stage '{}' (already completed)", name);
                report.skipped.push(name.to_string());
                continue;
            }

            info!("Running stage {}/{}: {}", index + 1, total, name);
            let ctx = StageContext {
                dry_run: mode.dry_run,
                state: &state,
                position: index + 1,
                total,
            };

            if let Err(e) = stage.execute(&ctx).await {
                error!(run_id = %state.run_id, "Stage '{}' failed: {:#}", name, e);
                return Err(PipelineError::Stage {
                    stage: name.to_string(),
                    source: e.into(),
                });
            }

            state.record_completed(name);
            if !mode.dry_run {
                self.store.save(&mut state)?;
            }
            report.executed.push(name.to_string());
        }

        if report.executed.is_empty() && state.terminal {
            info!(run_id = %state.run_id, "Run already complete, nothing to do");
        }

        state.mark_terminal();
        if !mode.dry_run {
            self.finalize(&mut state, mode.retain_state);
        }

        info!(
            run_id = %state.run_id,
            "Pipeline finished: {} executed, {} skipped",
            report.executed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Terminal checkpoint housekeeping; failures are logged only
    fn finalize(&self, state: &mut ExecutionState, retain: bool) {
        let result = if retain {
            self.store.save(state).map(|()| "retained with terminal marker")
        } else {
            self.store.remove().map(|()| "removed")
        };

        match result {
            Ok(what) => debug!("Checkpoint {} {}", self.store.path().display(), what),
            Err(e) => warn!("Checkpoint housekeeping failed: {}", e),
        }
    }
}
