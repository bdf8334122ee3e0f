//! Docker-compatible engine backend
//!
//! Talks to Docker, Colima, Docker Desktop, Lima or Podman through the
//! Docker Engine API using `bollard`.

use crate::config::Config;
use crate::engine::endpoint::{self, Endpoint, EndpointResolver, EngineConnector};
use crate::engine::runtime::{ContainerEngine, LogReceiver};
use crate::error::RuntimeError;
use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::{API_DEFAULT_VERSION, Docker};
use forgeline_core::RunOptions;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Log chunks buffered between the pump task and the reader
const LOG_CHANNEL_CAPACITY: usize = 256;

/// Connects `bollard` clients and pings them
#[derive(Debug, Clone)]
pub struct DockerConnector {
    /// Request timeout in seconds for unix socket clients
    pub request_timeout_secs: u64,
}

impl Default for DockerConnector {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
        }
    }
}

#[async_trait]
impl EngineConnector for DockerConnector {
    type Client = Docker;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Docker, RuntimeError> {
        let connect_err = |e: bollard::errors::Error| RuntimeError::Connect {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        };

        let docker = match endpoint {
            Endpoint::Socket(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                self.request_timeout_secs,
                API_DEFAULT_VERSION,
            ),
            Endpoint::Environment => Docker::connect_with_local_defaults(),
        }
        .map_err(connect_err)?;

        let docker = docker.negotiate_version().await.map_err(connect_err)?;
        docker.ping().await.map_err(connect_err)?;
        Ok(docker)
    }
}

/// Resolves an engine endpoint for this host and wraps it
///
/// # Returns
/// The endpoint that answered and an engine bound to it
pub async fn connect(config: &Config) -> Result<(Endpoint, DockerEngine), RuntimeError> {
    let candidates = endpoint::host_candidates(config.engine_socket.as_deref());
    let resolver = EndpointResolver::new(candidates, DockerConnector::default(), config.probe_timeout);
    let resolved = resolver.resolve().await?;
    Ok((resolved.endpoint, DockerEngine::new(resolved.client)))
}

/// [`ContainerEngine`] over a `bollard` client
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    fn container_config(opts: &RunOptions) -> ContainerConfig<String> {
        let mounts = opts
            .mounts
            .iter()
            .map(|m| Mount {
                target: Some(m.container_path.clone()),
                source: Some(m.host_path.to_string_lossy().into_owned()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();

        ContainerConfig {
            image: Some(opts.image.clone()),
            cmd: (!opts.command.is_empty()).then(|| opts.command.clone()),
            env: Some(opts.env_list()),
            working_dir: opts.working_dir.clone(),
            user: opts.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(HostConfig {
                mounts: Some(mounts),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(event) = progress.next().await {
            let event = event.map_err(|e| RuntimeError::Pull {
                image: image.to_string(),
                message: e.to_string(),
            })?;
            trace!("pull {}: {:?}", image, event.status);
        }
        Ok(())
    }

    async fn create_container(&self, opts: &RunOptions) -> Result<String, RuntimeError> {
        let options = opts.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let response = self
            .docker
            .create_container(options, Self::container_config(opts))
            .await
            .map_err(|e| RuntimeError::Create {
                image: opts.image.clone(),
                message: e.to_string(),
            })?;

        for warning in &response.warnings {
            debug!(container_id = %response.id, "Engine warning: {}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Start {
                id: id.to_string(),
                message: e.to_string(),
            })
    }

    async fn stream_logs(&self, id: &str) -> Result<LogReceiver, RuntimeError> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let docker = self.docker.clone();
        let id = id.to_string();
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut stream = Box::pin(docker.logs(&id, Some(options)));
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    item = stream.next() => match item {
                        Some(Ok(output)) => {
                            if tx.send(Ok(output.into_bytes().to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = tx
                                .send(Err(RuntimeError::Logs {
                                    id: id.clone(),
                                    message: e.to_string(),
                                }))
                                .await;
                            break;
                        }
                        None => break,
                    },
                }
            }
            trace!(container_id = %id, "Log stream closed");
        });

        Ok(rx)
    }

    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::Wait {
                id: id.to_string(),
                message: e.to_string(),
            }),
            None => Err(RuntimeError::Wait {
                id: id.to_string(),
                message: "wait stream ended without a status".to_string(),
            }),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| RuntimeError::Remove {
                id: id.to_string(),
                message: e.to_string(),
            })
    }
}
