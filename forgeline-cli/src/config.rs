//! Configuration module
//!
//! Builds the runner configuration from the environment and applies
//! command-line overrides.

use anyhow::{Context, Result};
use forgeline_runner::Config;
use std::path::PathBuf;

/// Loads and validates configuration
///
/// # Arguments
/// * `state_file` - `--state-file` override, if given
pub fn load(state_file: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(path) = state_file {
        config = config.with_state_file(path);
    }
    config.validate().context("Invalid configuration")?;

    tracing::debug!(
        "Loaded configuration: state_file={}, wait_timeout={:?}, image={}",
        config.state_file.display(),
        config.wait_timeout,
        config.terraform_image
    );
    Ok(config)
}
