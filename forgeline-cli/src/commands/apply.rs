//! `forgeline apply`

use anyhow::Result;
use colored::*;
use forgeline_runner::stages::build_pipeline;
use forgeline_runner::{Config, ProviderFactory, RunMode, RunReport, StageRunner, StateStore};
use std::path::Path;
use std::sync::Arc;

use crate::blueprint::load_blueprint;
use crate::output;

/// Runs the full workflow for a blueprint
pub async fn run_apply(
    file: &Path,
    dry_run: bool,
    retain_state: bool,
    auto_approve: bool,
    config: &Config,
) -> Result<()> {
    let blueprint = Arc::new(load_blueprint(file)?);

    if dry_run {
        println!("{}", "DRY RUN - no changes will be made".yellow().bold());
    }

    let factory = ProviderFactory::new(config.clone());
    let stages = build_pipeline(Arc::clone(&blueprint), factory, auto_approve);
    let runner = StageRunner::new(stages, StateStore::new(&config.state_file))?;

    let report = runner
        .run(
            file,
            RunMode {
                dry_run,
                retain_state,
            },
        )
        .await?;

    print_summary(&blueprint.metadata.name, &report, retain_state, config);
    Ok(())
}

fn print_summary(name: &str, report: &RunReport, retain_state: bool, config: &Config) {
    let headline = if report.dry_run {
        format!("✓ Dry run of '{}' completed", name)
    } else if report.executed.is_empty() {
        format!("✓ '{}' was already complete, nothing to do", name)
    } else {
        format!("✓ Workflow '{}' completed successfully", name)
    };
    println!("{}", headline.green().bold());

    output::field("Run", report.run_id.to_string().cyan());
    if report.resumed {
        output::field("Resumed", "yes".yellow());
    }
    output::field("Executed", list_or_dash(&report.executed));
    if !report.skipped.is_empty() {
        output::field("Skipped", list_or_dash(&report.skipped).dimmed());
    }

    if !report.dry_run && retain_state {
        output::field("State", config.state_file.display().to_string().dimmed());
    }
}

fn list_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}
