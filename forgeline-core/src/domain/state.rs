//! Execution checkpoint
//!
//! The durable record of how far a pipeline run has progressed. The runner
//! rewrites the whole record after every successful stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Schema version written into new checkpoints
pub const STATE_SCHEMA_VERSION: &str = "1.0";

/// Checkpoint of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub schema_version: String,
    /// Generated once per fresh run, kept across resumes
    pub run_id: Uuid,
    /// Name of the last stage that completed successfully, `None` before the first
    pub last_completed_stage: Option<String>,
    /// Workflow description that produced this run
    pub source_path: PathBuf,
    /// Set once every stage has completed
    #[serde(default)]
    pub terminal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionState {
    /// Creates the checkpoint for a fresh run
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: STATE_SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            last_completed_stage: None,
            source_path: source_path.into(),
            terminal: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// First eight hex characters of the run id, for resource names
    pub fn short_run_id(&self) -> String {
        self.run_id.simple().to_string()[..8].to_string()
    }

    /// Major component of `schema_version`
    pub fn schema_major(&self) -> Option<u32> {
        self.schema_version.split('.').next()?.parse().ok()
    }

    /// Records `stage` as the last completed stage
    ///
    /// Ordering is enforced by the stage runner, which is the only caller.
    pub fn record_completed(&mut self, stage: &str) {
        self.last_completed_stage = Some(stage.to_string());
    }

    /// Marks the run as finished
    pub fn mark_terminal(&mut self) {
        self.terminal = true;
    }

    /// Bumps `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
