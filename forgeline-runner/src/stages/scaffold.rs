//! Scaffold stage
//!
//! Copies the source module into the destination directory and writes
//! the blueprint's variables next to it as `terraform.tfvars.json`.

use crate::pipeline::{Stage, StageContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use forgeline_core::Blueprint;
use forgeline_core::domain::blueprint::ScaffoldConfig;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

pub const SCAFFOLD_STAGE: &str = "scaffold";

/// File the blueprint variables are written to
pub const TFVARS_FILE: &str = "terraform.tfvars.json";

/// What scaffolding did, or would do in a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    /// Written variables file, `None` when there are no variables
    pub tfvars: Option<PathBuf>,
}

/// Copies `config.source` into `config.destination` and writes variables
///
/// # Arguments
/// * `config` - Source and destination directories
/// * `variables` - Terraform input variables; nothing is written when empty
/// * `dry_run` - Only compute the report
pub fn scaffold(
    config: &ScaffoldConfig,
    variables: &BTreeMap<String, JsonValue>,
    dry_run: bool,
) -> Result<ScaffoldReport> {
    let source = &config.source;
    let destination = &config.destination;

    if !source.is_dir() {
        anyhow::bail!("source module directory not found: {}", source.display());
    }
    reject_traversal(destination)?;

    let mut report = ScaffoldReport::default();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .with_context(|| format!("{} is outside {}", entry.path().display(), source.display()))?;
        reject_traversal(relative)?;

        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            if !dry_run {
                std::fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create directory {}", target.display()))?;
            }
            report.directories.push(target);
        } else if entry.file_type().is_symlink() {
            if !dry_run {
                copy_symlink(entry.path(), &target)?;
            }
            report.files.push(target);
        } else {
            if !dry_run {
                std::fs::copy(entry.path(), &target).with_context(|| {
                    format!("Failed to copy {} to {}", entry.path().display(), target.display())
                })?;
            }
            report.files.push(target);
        }
    }

    if !variables.is_empty() {
        let path = destination.join(TFVARS_FILE);
        if !dry_run {
            write_tfvars(&path, variables)?;
        }
        report.tfvars = Some(path);
    }

    Ok(report)
}

/// Renders variables the way they are written to disk
pub fn render_tfvars(variables: &BTreeMap<String, JsonValue>) -> Result<String> {
    serde_json::to_string_pretty(variables).context("Failed to serialize variables")
}

fn write_tfvars(path: &Path, variables: &BTreeMap<String, JsonValue>) -> Result<()> {
    let body = render_tfvars(variables)?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(body.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

/// Recreates the link at `target` with the same, unresolved, link target
#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let points_to =
        std::fs::read_link(link).with_context(|| format!("Failed to read symlink {}", link.display()))?;
    if target.symlink_metadata().is_ok() {
        std::fs::remove_file(target)
            .with_context(|| format!("Failed to replace {}", target.display()))?;
    }
    std::os::unix::fs::symlink(&points_to, target)
        .with_context(|| format!("Failed to create symlink {}", target.display()))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> Result<()> {
    anyhow::bail!("symlinks are not supported in source modules: {}", link.display())
}

fn reject_traversal(path: &Path) -> Result<()> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("path contains directory traversal: {}", path.display());
    }
    Ok(())
}

/// Pipeline stage wrapping [`scaffold`]
pub struct ScaffoldStage {
    blueprint: Arc<Blueprint>,
}

impl ScaffoldStage {
    pub fn new(blueprint: Arc<Blueprint>) -> Self {
        Self { blueprint }
    }
}

#[async_trait]
impl Stage for ScaffoldStage {
    fn name(&self) -> &str {
        SCAFFOLD_STAGE
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<()> {
        let spec = &self.blueprint.spec;
        let report = scaffold(&spec.scaffold, &spec.variables, ctx.dry_run).context("Scaffolding failed")?;

        if ctx.dry_run {
            info!(
                "DRY RUN: Would copy {} to {}",
                spec.scaffold.source.display(),
                spec.scaffold.destination.display()
            );
            for dir in &report.directories {
                info!("DRY RUN: Would create directory: {}", dir.display());
            }
            for file in &report.files {
                info!("DRY RUN: Would copy file: {}", file.display());
            }
            if let Some(tfvars) = &report.tfvars {
                info!(
                    "DRY RUN: Would create {} with content:\n{}",
                    tfvars.display(),
                    render_tfvars(&spec.variables)?
                );
            }
        } else {
            info!(
                "Scaffolded {} file(s) to {}",
                report.files.len(),
                spec.scaffold.destination.display()
            );
        }
        Ok(())
    }
}
