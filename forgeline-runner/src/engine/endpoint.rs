//! Endpoint resolver
//!
//! Finds a reachable container engine. Candidates are tried in a fixed
//! order: an explicitly configured socket, the conventional socket
//! locations of the common engine installs, and finally whatever the
//! environment (`DOCKER_HOST` and friends) describes.

use crate::error::RuntimeError;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A connection target for a container engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A unix socket on the local filesystem
    Socket(PathBuf),
    /// The engine client's environment-derived default
    Environment,
}

impl Endpoint {
    /// Whether the endpoint exists on this host
    ///
    /// The environment default always counts as present.
    pub fn exists(&self) -> bool {
        match self {
            Self::Socket(path) => path.exists(),
            Self::Environment => true,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(path) => write!(f, "{}", path.display()),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// Opens a client to one endpoint and proves it is alive
#[async_trait]
pub trait EngineConnector: Send + Sync {
    type Client: Send;

    /// Connects to `endpoint` and performs a liveness handshake
    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Client, RuntimeError>;
}

/// A live client together with the endpoint it is bound to
#[derive(Debug)]
pub struct Resolved<C> {
    pub endpoint: Endpoint,
    pub client: C,
}

/// Ordered, bounded search over distinct engine endpoints
pub struct EndpointResolver<C> {
    candidates: Vec<Endpoint>,
    connector: C,
    probe_timeout: Duration,
}

impl<C: EngineConnector> EndpointResolver<C> {
    /// Creates a resolver over `candidates`
    ///
    /// The environment fallback is always tried last and must not be part
    /// of `candidates`.
    pub fn new(candidates: Vec<Endpoint>, connector: C, probe_timeout: Duration) -> Self {
        Self {
            candidates,
            connector,
            probe_timeout,
        }
    }

    pub fn candidates(&self) -> &[Endpoint] {
        &self.candidates
    }

    /// Returns the first endpoint that exists and answers
    ///
    /// # Returns
    /// The connected client, or `RuntimeError::EngineUnavailable` listing
    /// every endpoint that was attempted and the last failure
    pub async fn resolve(&self) -> Result<Resolved<C::Client>, RuntimeError> {
        let mut tried = Vec::new();
        let mut last_error = None;

        let explicit = self
            .candidates
            .iter()
            .filter(|endpoint| **endpoint != Endpoint::Environment);

        for endpoint in explicit.chain(std::iter::once(&Endpoint::Environment)) {
            if !endpoint.exists() {
                debug!("Skipping missing engine endpoint {}", endpoint);
                continue;
            }

            tried.push(endpoint.to_string());
            match self.probe(endpoint).await {
                Ok(client) => {
                    info!("Connected to container engine at {}", endpoint);
                    return Ok(Resolved {
                        endpoint: endpoint.clone(),
                        client,
                    });
                }
                Err(e) => {
                    debug!("Engine endpoint {} not usable: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| RuntimeError::Connect {
            endpoint: Endpoint::Environment.to_string(),
            message: "no candidate endpoint exists".to_string(),
        });
        warn!("No reachable container engine after {} attempt(s)", tried.len());
        Err(RuntimeError::EngineUnavailable {
            tried,
            last: Box::new(last),
        })
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<C::Client, RuntimeError> {
        match tokio::time::timeout(self.probe_timeout, self.connector.connect(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Connect {
                endpoint: endpoint.to_string(),
                message: format!("no answer within {:?}", self.probe_timeout),
            }),
        }
    }
}

/// Conventional engine socket locations, most specific first
///
/// # Arguments
/// * `configured` - Socket path from configuration, tried before all others
/// * `home` - The user's home directory
/// * `runtime_dir` - `$XDG_RUNTIME_DIR`, if set
pub fn default_candidates(
    configured: Option<&Path>,
    home: &Path,
    runtime_dir: Option<&Path>,
) -> Vec<Endpoint> {
    let mut paths: Vec<PathBuf> = Vec::new();

    if let Some(path) = configured {
        paths.push(path.to_path_buf());
    }

    paths.extend([
        home.join(".colima/docker.sock"),
        home.join(".colima/default/docker.sock"),
        home.join(".docker/run/docker.sock"),
        home.join(".docker/desktop/docker.sock"),
        home.join(".local/share/containers/podman/machine/podman.sock"),
        PathBuf::from("/var/run/docker.sock"),
    ]);

    if let Some(dir) = runtime_dir {
        paths.push(dir.join("docker.sock"));
        paths.push(dir.join("podman/podman.sock"));
    }

    paths.push(home.join(".lima/docker/sock/docker.sock"));

    let mut candidates: Vec<Endpoint> = Vec::with_capacity(paths.len());
    for path in paths {
        let endpoint = Endpoint::Socket(path);
        if !candidates.contains(&endpoint) {
            candidates.push(endpoint);
        }
    }
    candidates
}

/// Home directory used to locate per-user engine sockets
///
/// `$HOME` wins; otherwise the platform lookup, then `/Users/$USER`.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| {
            let user = std::env::var("USER").unwrap_or_default();
            PathBuf::from("/Users").join(user)
        })
}

/// Candidate list for this host
pub fn host_candidates(configured: Option<&Path>) -> Vec<Endpoint> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
    default_candidates(configured, &home_dir(), runtime_dir.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Connector that answers only on a fixed set of endpoints
    struct FakeConnector {
        reachable: HashSet<Endpoint>,
        attempts: Mutex<Vec<Endpoint>>,
        hang: Option<Endpoint>,
    }

    impl FakeConnector {
        fn new(reachable: impl IntoIterator<Item = Endpoint>) -> Self {
            Self {
                reachable: reachable.into_iter().collect(),
                attempts: Mutex::new(Vec::new()),
                hang: None,
            }
        }

        fn attempts(&self) -> Vec<Endpoint> {
            self.attempts.lock().unwrap().clone()
        }

        fn hanging_on(mut self, endpoint: Endpoint) -> Self {
            self.hang = Some(endpoint);
            self
        }
    }

    #[async_trait]
    impl EngineConnector for FakeConnector {
        type Client = Endpoint;

        async fn connect(&self, endpoint: &Endpoint) -> Result<Endpoint, RuntimeError> {
            self.attempts.lock().unwrap().push(endpoint.clone());
            if self.hang.as_ref() == Some(endpoint) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.reachable.contains(endpoint) {
                Ok(endpoint.clone())
            } else {
                Err(RuntimeError::Connect {
                    endpoint: endpoint.to_string(),
                    message: "connection refused".to_string(),
                })
            }
        }
    }

    fn sockets(dir: &Path, names: &[&str]) -> Vec<Endpoint> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"").unwrap();
                Endpoint::Socket(path)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_returns_first_reachable_without_trying_more() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = sockets(dir.path(), &["a.sock", "b.sock", "c.sock", "d.sock"]);
        let connector = FakeConnector::new([candidates[2].clone(), candidates[3].clone()]);

        let resolver = EndpointResolver::new(candidates.clone(), connector, Duration::from_secs(1));
        let resolved = resolver.resolve().await.unwrap();

        assert_eq!(resolved.endpoint, candidates[2]);
        assert_eq!(resolved.client, candidates[2]);
        assert_eq!(resolver.connector.attempts(), candidates[..3].to_vec());
    }

    #[tokio::test]
    async fn test_skips_missing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let present = sockets(dir.path(), &["present.sock"]);
        let missing = Endpoint::Socket(dir.path().join("missing.sock"));
        let connector = FakeConnector::new(present.clone());

        let resolver = EndpointResolver::new(
            vec![missing, present[0].clone()],
            connector,
            Duration::from_secs(1),
        );
        let resolved = resolver.resolve().await.unwrap();

        assert_eq!(resolved.endpoint, present[0]);
        assert_eq!(resolver.connector.attempts(), present);
    }

    #[tokio::test]
    async fn test_falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = sockets(dir.path(), &["dead.sock"]);
        let connector = FakeConnector::new([Endpoint::Environment]);

        let resolver = EndpointResolver::new(candidates.clone(), connector, Duration::from_secs(1));
        let resolved = resolver.resolve().await.unwrap();

        assert_eq!(resolved.endpoint, Endpoint::Environment);
        assert_eq!(
            resolver.connector.attempts(),
            vec![candidates[0].clone(), Endpoint::Environment]
        );
    }

    #[tokio::test]
    async fn test_aggregated_error_when_nothing_answers() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = sockets(dir.path(), &["one.sock", "two.sock"]);
        let connector = FakeConnector::new([]);

        let resolver = EndpointResolver::new(candidates, connector, Duration::from_secs(1));
        let err = resolver.resolve().await.unwrap_err();

        match err {
            RuntimeError::EngineUnavailable { tried, last } => {
                assert_eq!(tried.len(), 3);
                assert_eq!(tried[2], "environment");
                assert!(last.to_string().contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_hanging_endpoint_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = sockets(dir.path(), &["slow.sock", "fast.sock"]);
        let connector = FakeConnector::new([candidates[1].clone()]).hanging_on(candidates[0].clone());

        let resolver = EndpointResolver::new(candidates.clone(), connector, Duration::from_millis(50));
        let resolved = resolver.resolve().await.unwrap();

        assert_eq!(resolved.endpoint, candidates[1]);
    }

    #[test]
    fn test_default_candidate_order() {
        let home = Path::new("/home/dev");
        let candidates = default_candidates(
            Some(Path::new("/custom/engine.sock")),
            home,
            Some(Path::new("/run/user/1000")),
        );

        let paths: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "/custom/engine.sock",
                "/home/dev/.colima/docker.sock",
                "/home/dev/.colima/default/docker.sock",
                "/home/dev/.docker/run/docker.sock",
                "/home/dev/.docker/desktop/docker.sock",
                "/home/dev/.local/share/containers/podman/machine/podman.sock",
                "/var/run/docker.sock",
                "/run/user/1000/docker.sock",
                "/run/user/1000/podman/podman.sock",
                "/home/dev/.lima/docker/sock/docker.sock",
            ]
        );
    }

    #[test]
    fn test_default_candidates_dedupe_configured() {
        let candidates = default_candidates(
            Some(Path::new("/var/run/docker.sock")),
            Path::new("/home/dev"),
            None,
        );
        let count = candidates
            .iter()
            .filter(|c| c.to_string() == "/var/run/docker.sock")
            .count();
        assert_eq!(count, 1);
        assert_eq!(candidates[0].to_string(), "/var/run/docker.sock");
    }
}
