//! Execution state store
//!
//! One checkpoint record at one path. Every write replaces the whole
//! record; there are no partial updates.

use crate::error::StateError;
use crate::pipeline::lock::{self, StateLock};
use forgeline_core::ExecutionState;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Schema major version this build reads
const SUPPORTED_SCHEMA_MAJOR: u32 = 1;

/// Checkpoint persistence at a fixed path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the advisory lock file guarding this store
    pub fn lock_path(&self) -> PathBuf {
        lock::lock_path_for(&self.path)
    }

    /// Takes the exclusive advisory lock for this store
    pub fn lock(&self) -> Result<StateLock, StateError> {
        StateLock::acquire(&self.path)
    }

    /// Loads the checkpoint
    ///
    /// # Returns
    /// * `Ok(Some(state))` - A checkpoint exists
    /// * `Ok(None)` - No checkpoint, start fresh
    /// * `Err(StateError::Corrupt)` - The file exists but does not parse
    pub fn load(&self) -> Result<Option<ExecutionState>, StateError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let state: ExecutionState = serde_json::from_slice(&bytes).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        if state.schema_major() != Some(SUPPORTED_SCHEMA_MAJOR) {
            return Err(StateError::UnsupportedSchema {
                path: self.path.clone(),
                found: state.schema_version,
            });
        }

        debug!(
            run_id = %state.run_id,
            "Loaded checkpoint from {} (last completed: {})",
            self.path.display(),
            state.last_completed_stage.as_deref().unwrap_or("none")
        );
        Ok(Some(state))
    }

    /// Overwrites the checkpoint with `state`, bumping `updated_at`
    ///
    /// The record is written to a sibling temporary file and renamed into
    /// place, so readers see either the old or the new record.
    pub fn save(&self, state: &mut ExecutionState) -> Result<(), StateError> {
        state.touch();
        let body = serde_json::to_vec_pretty(state).map_err(StateError::Serialize)?;

        let tmp_path = self.tmp_path();
        let io_err = |path: &Path, source| StateError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(&tmp_path, &body).map_err(|e| io_err(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| io_err(&self.path, e))?;

        debug!(run_id = %state.run_id, "Saved checkpoint to {}", self.path.display());
        Ok(())
    }

    /// Deletes the checkpoint; a missing file is not an error
    pub fn remove(&self) -> Result<(), StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed checkpoint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
