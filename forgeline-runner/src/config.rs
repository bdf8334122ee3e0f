//! Runner configuration
//!
//! Defines the configurable parameters of a pipeline run: where the
//! checkpoint lives, how long container operations may take, and which
//! engine endpoint and provisioning image to use.

use std::path::PathBuf;
use std::time::Duration;

/// Default checkpoint path, relative to the invocation's working directory
pub const DEFAULT_STATE_FILE: &str = ".forgeline.state.json";

/// Default image for the Terraform provisioner
pub const DEFAULT_TERRAFORM_IMAGE: &str = "hashicorp/terraform:1.8.0";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Checkpoint file path
    pub state_file: PathBuf,

    /// Bound on waiting for a container to stop
    pub wait_timeout: Duration,

    /// Bound on removing a finished container
    pub remove_timeout: Duration,

    /// Bound on each endpoint liveness check
    pub probe_timeout: Duration,

    /// Image the provisioner runs Terraform from
    pub terraform_image: String,

    /// Engine socket tried before the conventional locations
    pub engine_socket: Option<PathBuf>,

    /// AWS configuration directory; `~/.aws` when unset
    pub aws_config_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            wait_timeout: Duration::from_secs(30),
            remove_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            terraform_image: DEFAULT_TERRAFORM_IMAGE.to_string(),
            engine_socket: None,
            aws_config_dir: None,
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - FORGELINE_STATE_FILE (optional, default: .forgeline.state.json)
    /// - FORGELINE_WAIT_TIMEOUT (optional, seconds, default: 30)
    /// - FORGELINE_REMOVE_TIMEOUT (optional, seconds, default: 10)
    /// - FORGELINE_PROBE_TIMEOUT (optional, seconds, default: 5)
    /// - FORGELINE_TERRAFORM_IMAGE (optional, default: hashicorp/terraform:1.8.0)
    /// - FORGELINE_ENGINE_SOCKET (optional)
    /// - FORGELINE_AWS_CONFIG_DIR (optional, default: ~/.aws)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got '{}'", key, raw)),
                None => Ok(default),
            }
        };

        let wait_timeout = seconds("FORGELINE_WAIT_TIMEOUT", defaults.wait_timeout)?;
        let remove_timeout = seconds("FORGELINE_REMOVE_TIMEOUT", defaults.remove_timeout)?;
        let probe_timeout = seconds("FORGELINE_PROBE_TIMEOUT", defaults.probe_timeout)?;

        let state_file = lookup("FORGELINE_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        let terraform_image = lookup("FORGELINE_TERRAFORM_IMAGE").unwrap_or(defaults.terraform_image);

        let engine_socket = lookup("FORGELINE_ENGINE_SOCKET")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let aws_config_dir = lookup("FORGELINE_AWS_CONFIG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            state_file,
            wait_timeout,
            remove_timeout,
            probe_timeout,
            terraform_image,
            engine_socket,
            aws_config_dir,
        })
    }

    /// Overrides the checkpoint path
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = path.into();
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.state_file.as_os_str().is_empty() {
            anyhow::bail!("state_file cannot be empty");
        }

        if self.wait_timeout.is_zero() {
            anyhow::bail!("wait_timeout must be greater than 0");
        }

        if self.remove_timeout.is_zero() {
            anyhow::bail!("remove_timeout must be greater than 0");
        }

        if self.probe_timeout.is_zero() {
            anyhow::bail!("probe_timeout must be greater than 0");
        }

        if self.terraform_image.trim().is_empty() {
            anyhow::bail!("terraform_image cannot be empty");
        }

        Ok(())
    }
}
