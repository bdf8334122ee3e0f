//! Error types for the runner
//!
//! Three families, one per layer:
//! - `RuntimeError`: container engine and container lifecycle failures
//! - `StateError`: checkpoint store failures
//! - `PipelineError`: what the stage runner reports to its caller

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the endpoint resolver and the container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// One endpoint could not be reached
    #[error("failed to connect to container engine at {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// Every candidate endpoint, including the environment default, failed
    #[error("no reachable container engine (tried: {})", .tried.join(", "))]
    EngineUnavailable {
        tried: Vec<String>,
        #[source]
        last: Box<RuntimeError>,
    },

    #[error("failed to pull image {image}: {message}")]
    Pull { image: String, message: String },

    #[error("failed to create container from {image}: {message}")]
    Create { image: String, message: String },

    #[error("failed to start container {id}: {message}")]
    Start { id: String, message: String },

    #[error("failed to read logs of container {id}: {message}")]
    Logs { id: String, message: String },

    /// The workload ran and failed
    #[error("container {id} exited with non-zero status: {code}")]
    NonZeroExit { id: String, code: i64 },

    /// The workload did not finish within the wait bound
    #[error("timed out after {timeout:?} waiting for container {id} to exit")]
    WaitTimeout { id: String, timeout: Duration },

    #[error("failed to wait for container {id}: {message}")]
    Wait { id: String, message: String },

    #[error("failed to remove container {id}: {message}")]
    Remove { id: String, message: String },
}

impl RuntimeError {
    /// True when the container never finished within its wait bound
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Exit code of a container that finished unsuccessfully
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when no engine endpoint answered
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable { .. })
    }
}

/// Errors raised by the checkpoint store
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed for {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid checkpoint
    #[error("state file {} is corrupt", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {} has unsupported schema version {found}", .path.display())]
    UnsupportedSchema { path: PathBuf, found: String },

    #[error("failed to serialize state")]
    Serialize(#[source] serde_json::Error),

    /// Another invocation holds the checkpoint
    #[error("state file {} is locked by another run (lock file {})", .path.display(), .lock_path.display())]
    Locked { path: PathBuf, lock_path: PathBuf },
}

/// Errors reported by the stage runner
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("stage name '{0}' appears more than once in the pipeline")]
    DuplicateStage(String),

    /// The checkpoint names a stage this pipeline does not have
    #[error("checkpoint references unknown stage '{stage}'")]
    UnknownCheckpointStage { stage: String },

    #[error("stage '{stage}' failed")]
    Stage {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    /// Name of the failed stage, if a stage failed
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
