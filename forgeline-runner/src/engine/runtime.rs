//! Container runtime
//!
//! Runs one command in one container and hands the caller a
//! [`ContainerHandle`] to read its output and finalize it.
//!
//! The engine seam is [`ContainerEngine`], a thin set of primitive calls
//! (create, start, logs, wait, remove). [`EngineRuntime`] composes them
//! into the two operations stages use:
//! - `pull_image`: fetch an image, discarding progress
//! - `run_container`: create, start and attach to a container

use crate::engine::sanitize;
use crate::error::RuntimeError;
use async_trait::async_trait;
use forgeline_core::RunOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Raw output chunks of one container, in arrival order
pub type LogReceiver = mpsc::Receiver<Result<Vec<u8>, RuntimeError>>;

/// Primitive container engine operations
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pulls `image`, draining and discarding progress
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Creates a stopped container and returns its id
    async fn create_container(&self, opts: &RunOptions) -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Opens the combined stdout/stderr stream
    ///
    /// The stream is pumped by a background task until it ends or the
    /// receiver is closed.
    async fn stream_logs(&self, id: &str) -> Result<LogReceiver, RuntimeError>;

    /// Waits until the container is no longer running and returns its exit code
    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError>;

    /// Force-removes the container
    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;
}

/// What stages use to run containerized commands
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fetches `image` into the engine's local cache
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Creates and starts a container described by `opts`
    ///
    /// # Returns
    /// A handle that must be finalized with [`ContainerHandle::finish`]
    async fn run_container(&self, opts: RunOptions) -> Result<ContainerHandle, RuntimeError>;
}

/// Container runtime backed by a [`ContainerEngine`]
#[derive(Clone)]
pub struct EngineRuntime {
    engine: Arc<dyn ContainerEngine>,
    wait_timeout: Duration,
    remove_timeout: Duration,
}

impl EngineRuntime {
    /// Creates a runtime with the given wait and removal bounds
    pub fn new(engine: Arc<dyn ContainerEngine>, wait_timeout: Duration, remove_timeout: Duration) -> Self {
        Self {
            engine,
            wait_timeout,
            remove_timeout,
        }
    }

    /// Removes a container that never became usable, logging any failure
    async fn discard(&self, id: &str) {
        match tokio::time::timeout(self.remove_timeout, self.engine.remove_container(id)).await {
            Ok(Ok(())) => debug!("Removed unusable container {}", id),
            Ok(Err(e)) => warn!("Failed to remove unusable container {}: {}", id, e),
            Err(_) => warn!("Timed out removing unusable container {}", id),
        }
    }
}

#[async_trait]
impl ContainerRuntime for EngineRuntime {
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!("Pulling image {}", image);
        self.engine.pull_image(image).await?;
        debug!("Image {} is available", image);
        Ok(())
    }

    async fn run_container(&self, opts: RunOptions) -> Result<ContainerHandle, RuntimeError> {
        let id = self.engine.create_container(&opts).await?;
        debug!(container_id = %id, "Created container from {}", opts.image);

        if let Err(e) = self.engine.start_container(&id).await {
            self.discard(&id).await;
            return Err(e);
        }

        let logs = match self.engine.stream_logs(&id).await {
            Ok(logs) => logs,
            Err(e) => {
                self.discard(&id).await;
                return Err(e);
            }
        };

        info!(
            container_id = %id,
            "Started container {}",
            opts.name.as_deref().unwrap_or(&id)
        );

        Ok(ContainerHandle {
            id,
            retain: opts.retain,
            engine: Arc::clone(&self.engine),
            logs,
            pending: Vec::new(),
            eof: false,
            wait_timeout: self.wait_timeout,
            remove_timeout: self.remove_timeout,
            finalized: false,
        })
    }
}

/// Result of post-run housekeeping, reported separately from the workload result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    Retained,
    Failed(String),
}

impl CleanupOutcome {
    /// Logs the outcome; it never becomes the caller's error
    pub fn log(&self, container_id: &str) {
        match self {
            Self::Removed => debug!(container_id, "Removed container"),
            Self::Retained => info!(container_id, "Retained container"),
            Self::Failed(reason) => warn!(container_id, "Failed to remove container: {}", reason),
        }
    }
}

/// A started container
///
/// Read its output with [`next_line`](Self::next_line), then call
/// [`finish`](Self::finish) exactly once. A handle dropped without being
/// finished still has its container removed in the background unless it
/// was started with `retain`.
pub struct ContainerHandle {
    id: String,
    retain: bool,
    engine: Arc<dyn ContainerEngine>,
    logs: LogReceiver,
    pending: Vec<u8>,
    eof: bool,
    wait_timeout: Duration,
    remove_timeout: Duration,
    finalized: bool,
}

impl std::fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("id", &self.id)
            .field("retain", &self.retain)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl ContainerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next raw output line without its terminator, `None` at end of stream
    pub async fn next_raw_line(&mut self) -> Option<Result<Vec<u8>, RuntimeError>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Some(Ok(line));
            }

            if self.eof {
                if self.pending.is_empty() {
                    return None;
                }
                return Some(Ok(std::mem::take(&mut self.pending)));
            }

            match self.logs.recv().await {
                Some(Ok(chunk)) => self.pending.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.eof = true;
                    return Some(Err(e));
                }
                None => self.eof = true,
            }
        }
    }

    /// Next sanitized, non-empty output line, `None` at end of stream
    pub async fn next_line(&mut self) -> Option<Result<String, RuntimeError>> {
        while let Some(raw) = self.next_raw_line().await {
            match raw {
                Ok(raw) => {
                    let line = sanitize::clean(&raw);
                    if !line.is_empty() {
                        return Some(Ok(line));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    /// Waits for the container to exit and cleans it up
    ///
    /// # Returns
    /// `Ok` for exit code 0, `NonZeroExit` for any other code, and
    /// `WaitTimeout` if the container did not stop in time
    pub async fn finish(self) -> Result<(), RuntimeError> {
        let (result, _) = self.finish_with_cleanup().await;
        result
    }

    /// Like [`finish`](Self::finish), also returning the cleanup outcome
    pub async fn finish_with_cleanup(mut self) -> (Result<(), RuntimeError>, CleanupOutcome) {
        self.finalized = true;
        self.logs.close();

        let result = match tokio::time::timeout(self.wait_timeout, self.engine.wait_container(&self.id)).await {
            Err(_) => Err(RuntimeError::WaitTimeout {
                id: self.id.clone(),
                timeout: self.wait_timeout,
            }),
            Ok(Ok(0)) => Ok(()),
            Ok(Ok(code)) => Err(RuntimeError::NonZeroExit {
                id: self.id.clone(),
                code,
            }),
            Ok(Err(e)) => Err(e),
        };

        let cleanup = if self.retain {
            CleanupOutcome::Retained
        } else {
            match tokio::time::timeout(self.remove_timeout, self.engine.remove_container(&self.id)).await {
                Ok(Ok(())) => CleanupOutcome::Removed,
                Ok(Err(e)) => CleanupOutcome::Failed(e.to_string()),
                Err(_) => CleanupOutcome::Failed(format!("timed out after {:?}", self.remove_timeout)),
            }
        };
        cleanup.log(&self.id);

        (result, cleanup)
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        if self.finalized || self.retain {
            return;
        }

        warn!(container_id = %self.id, "Container handle dropped without finish, removing in background");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(container_id = %self.id, "No async runtime available, container left behind");
            return;
        };

        let engine = Arc::clone(&self.engine);
        let id = self.id.clone();
        let remove_timeout = self.remove_timeout;
        runtime.spawn(async move {
            let outcome = match tokio::time::timeout(remove_timeout, engine.remove_container(&id)).await {
                Ok(Ok(())) => CleanupOutcome::Removed,
                Ok(Err(e)) => CleanupOutcome::Failed(e.to_string()),
                Err(_) => CleanupOutcome::Failed(format!("timed out after {:?}", remove_timeout)),
            };
            outcome.log(&id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;

    fn runtime(engine: Arc<FakeEngine>) -> EngineRuntime {
        EngineRuntime::new(engine, Duration::from_secs(5), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_exit_zero_is_success() {
        let engine = Arc::new(FakeEngine::new().exiting_with([0]));
        let handle = runtime(engine.clone())
            .run_container(RunOptions::new("alpine:3"))
            .await
            .unwrap();
        let id = handle.id().to_string();

        let (result, cleanup) = handle.finish_with_cleanup().await;
        assert!(result.is_ok());
        assert_eq!(cleanup, CleanupOutcome::Removed);
        assert_eq!(engine.removed(), vec![id]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_code() {
        let engine = Arc::new(FakeEngine::new().exiting_with([2]));
        let handle = runtime(engine.clone())
            .run_container(RunOptions::new("alpine:3"))
            .await
            .unwrap();

        let err = handle.finish().await.unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
        assert!(!err.is_timeout());
        assert_eq!(engine.removed().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout_is_distinct() {
        let engine = Arc::new(FakeEngine::new().with_wait_delay(Duration::from_secs(3600)));
        let runtime = EngineRuntime::new(engine.clone(), Duration::from_millis(50), Duration::from_secs(1));
        let handle = runtime.run_container(RunOptions::new("alpine:3")).await.unwrap();

        let err = handle.finish().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.exit_code(), None);
        assert_eq!(engine.removed().len(), 1);
    }

    #[tokio::test]
    async fn test_retained_container_is_not_removed() {
        let engine = Arc::new(FakeEngine::new().exiting_with([0]));
        let handle = runtime(engine.clone())
            .run_container(RunOptions::new("alpine:3").retained(true))
            .await
            .unwrap();

        let (result, cleanup) = handle.finish_with_cleanup().await;
        assert!(result.is_ok());
        assert_eq!(cleanup, CleanupOutcome::Retained);
        assert!(engine.removed().is_empty());
    }

    #[tokio::test]
    async fn test_removal_failure_does_not_mask_exit_result() {
        let engine = Arc::new(FakeEngine::new().exiting_with([0]).failing_remove());
        let handle = runtime(engine.clone())
            .run_container(RunOptions::new("alpine:3"))
            .await
            .unwrap();

        let (result, cleanup) = handle.finish_with_cleanup().await;
        assert!(result.is_ok());
        assert!(matches!(cleanup, CleanupOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_start_failure_discards_container() {
        let engine = Arc::new(FakeEngine::new().failing_start());
        let err = runtime(engine.clone())
            .run_container(RunOptions::new("alpine:3"))
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Start { .. }));
        assert_eq!(engine.created().len(), 1);
        assert_eq!(engine.removed().len(), 1);
    }

    #[tokio::test]
    async fn test_lines_are_split_and_sanitized() {
        let engine = Arc::new(FakeEngine::new().with_logs([
            b"\x1b[1mInitializing".to_vec(),
            b" the backend...\x1b[0m\r\n\n".to_vec(),
            vec![0x05; 12],
            b"\nPlan: 2 to add".to_vec(),
        ]));
        let mut handle = runtime(engine)
            .run_container(RunOptions::new("hashicorp/terraform:1.8.0"))
            .await
            .unwrap();

        let mut lines = Vec::new();
        while let Some(line) = handle.next_line().await {
            lines.push(line.unwrap());
        }
        handle.finish().await.unwrap();

        assert_eq!(lines, vec!["Initializing the backend...", "Plan: 2 to add"]);
    }

    #[tokio::test]
    async fn test_finish_without_reading_logs() {
        let engine = Arc::new(FakeEngine::new().with_logs(vec![b"line\n".to_vec(); 64]));
        let handle = runtime(engine)
            .run_container(RunOptions::new("alpine:3"))
            .await
            .unwrap();

        assert!(handle.finish().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_handle_is_removed_in_background() {
        let engine = Arc::new(FakeEngine::new());
        let handle = runtime(engine.clone())
            .run_container(RunOptions::new("alpine:3"))
            .await
            .unwrap();
        drop(handle);

        for _ in 0..100 {
            if !engine.removed().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.removed().len(), 1);
    }
}
