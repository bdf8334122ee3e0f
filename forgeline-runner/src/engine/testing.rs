//! In-process container engine for tests

use crate::engine::runtime::{ContainerEngine, LogReceiver};
use crate::error::RuntimeError;
use async_trait::async_trait;
use forgeline_core::RunOptions;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Records every call and answers from canned values
///
/// Like a real engine, a name stays taken until its container is removed.
#[derive(Default)]
pub(crate) struct FakeEngine {
    exit_codes: Mutex<VecDeque<i64>>,
    wait_delay: Option<Duration>,
    fail_start: bool,
    fail_remove: bool,
    fail_pull: bool,
    log_chunks: Vec<Vec<u8>>,
    next_id: AtomicUsize,
    pulled: Mutex<Vec<String>>,
    created: Mutex<Vec<RunOptions>>,
    removed: Mutex<Vec<String>>,
    live_names: Mutex<HashMap<String, String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit codes handed out in wait order; 0 once exhausted
    pub fn exiting_with(self, codes: impl IntoIterator<Item = i64>) -> Self {
        *self.exit_codes.lock().unwrap() = codes.into_iter().collect();
        self
    }

    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = Some(delay);
        self
    }

    pub fn with_logs(mut self, chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.log_chunks = chunks.into_iter().collect();
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn failing_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    pub fn pulled(&self) -> Vec<String> {
        self.pulled.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<RunOptions> {
        self.created.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        if self.fail_pull {
            return Err(RuntimeError::Pull {
                image: image.to_string(),
                message: "manifest unknown".to_string(),
            });
        }
        self.pulled.lock().unwrap().push(image.to_string());
        Ok(())
    }

    async fn create_container(&self, opts: &RunOptions) -> Result<String, RuntimeError> {
        let mut live = self.live_names.lock().unwrap();
        if let Some(name) = &opts.name {
            if live.values().any(|taken| taken == name) {
                return Err(RuntimeError::Create {
                    image: opts.image.clone(),
                    message: format!("Conflict. The container name \"/{}\" is already in use", name),
                });
            }
        }

        self.created.lock().unwrap().push(opts.clone());
        let id = format!("container-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Some(name) = &opts.name {
            live.insert(id.clone(), name.clone());
        }
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        if self.fail_start {
            return Err(RuntimeError::Start {
                id: id.to_string(),
                message: "no such image".to_string(),
            });
        }
        Ok(())
    }

    async fn stream_logs(&self, _id: &str) -> Result<LogReceiver, RuntimeError> {
        let (tx, rx) = mpsc::channel(8);
        let chunks = self.log_chunks.clone();
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn wait_container(&self, _id: &str) -> Result<i64, RuntimeError> {
        if let Some(delay) = self.wait_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.exit_codes.lock().unwrap().pop_front().unwrap_or(0))
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        if self.fail_remove {
            return Err(RuntimeError::Remove {
                id: id.to_string(),
                message: "device busy".to_string(),
            });
        }
        self.live_names.lock().unwrap().remove(id);
        self.removed.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
