//! Container invocation types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A host directory or file bound into the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

/// Description of one container execution
///
/// Passed by value into the container runtime for the duration of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Image reference (e.g., "hashicorp/terraform:1.8.0")
    pub image: String,
    /// Command and arguments; empty means the image default
    pub command: Vec<String>,
    pub mounts: Vec<BindMount>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    /// "uid:gid" to run as, so files written to mounts stay owned by the host user
    pub user: Option<String>,
    /// Stable container name; the engine assigns one when `None`
    pub name: Option<String>,
    /// Leave the container in place after it exits
    pub retain: bool,
}

impl RunOptions {
    /// Creates options for `image` with everything else defaulted
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mount(mut self, host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        self.mounts.push(BindMount {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: false,
        });
        self
    }

    pub fn with_read_only_mount(
        mut self,
        host_path: impl Into<PathBuf>,
        container_path: impl Into<String>,
    ) -> Self {
        self.mounts.push(BindMount {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: true,
        });
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn retained(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Environment in `KEY=value` form, sorted by key
    pub fn env_list(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let opts = RunOptions::new("alpine:3")
            .with_command(["sh", "-c", "true"])
            .with_mount("/tmp/work", "/workspace")
            .with_read_only_mount("/home/me/.aws", "/root/.aws")
            .with_env("B", "2")
            .with_env("A", "1")
            .with_working_dir("/workspace")
            .with_user("1000:1000")
            .with_name("job-1")
            .retained(true);

        assert_eq!(opts.command, vec!["sh", "-c", "true"]);
        assert_eq!(opts.mounts.len(), 2);
        assert!(!opts.mounts[0].read_only);
        assert!(opts.mounts[1].read_only);
        assert_eq!(opts.env_list(), vec!["A=1", "B=2"]);
        assert_eq!(opts.user.as_deref(), Some("1000:1000"));
        assert_eq!(opts.name.as_deref(), Some("job-1"));
        assert!(opts.retain);
    }

    #[test]
    fn test_defaults() {
        let opts = RunOptions::new("alpine:3");
        assert!(opts.command.is_empty());
        assert!(opts.working_dir.is_none());
        assert!(!opts.retain);
    }
}
