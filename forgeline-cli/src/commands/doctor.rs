//! `forgeline doctor`

use anyhow::{Context, Result};
use colored::*;
use forgeline_runner::Config;
use forgeline_runner::engine::{docker, endpoint};
use std::process::Command;

/// Reports which container engine endpoint answers and whether git is usable
pub async fn run_doctor(config: &Config) -> Result<()> {
    println!("{}", "Engine endpoints:".bold());
    for candidate in endpoint::host_candidates(config.engine_socket.as_deref()) {
        let mark = if candidate.exists() {
            "present".green()
        } else {
            "missing".dimmed()
        };
        println!("  {:<60} {}", candidate.to_string(), mark);
    }
    println!();

    let (endpoint, _engine) = docker::connect(config).await?;
    println!(
        "{} {}",
        "✓ Container engine reachable at".green().bold(),
        endpoint.to_string().cyan()
    );

    let git = check_git_available()?;
    println!("{} {}", "✓ git available:".green().bold(), git.dimmed());
    Ok(())
}

/// Checks that git is installed and returns its version line
fn check_git_available() -> Result<String> {
    let output = Command::new("git")
        .arg("--version")
        .output()
        .context("Failed to execute 'git --version'. Is git installed?")?;

    if !output.status.success() {
        anyhow::bail!("git is not working correctly");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
