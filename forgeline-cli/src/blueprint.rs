//! Blueprint loading
//!
//! Reads a blueprint YAML file and checks it is one. Deeper validation is
//! left to the stages, which fail with a configuration error when a path
//! or setting they need is missing.

use anyhow::{Context, Result};
use forgeline_core::Blueprint;
use forgeline_core::domain::blueprint::BLUEPRINT_KIND;
use std::path::Path;

/// Loads the blueprint at `path`
pub fn load_blueprint(path: &Path) -> Result<Blueprint> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read blueprint file: {}", path.display()))?;
    parse_blueprint(&content).with_context(|| format!("Blueprint parsing failed: {}", path.display()))
}

fn parse_blueprint(content: &str) -> Result<Blueprint> {
    let blueprint: Blueprint = serde_yaml::from_str(content).context("Invalid blueprint YAML")?;

    if blueprint.kind != BLUEPRINT_KIND {
        anyhow::bail!(
            "unsupported kind '{}', expected '{}'",
            blueprint.kind,
            BLUEPRINT_KIND
        );
    }

    tracing::info!(
        "Blueprint parsed successfully: {} ({})",
        blueprint.metadata.name,
        blueprint.api_version
    );
    Ok(blueprint)
}
