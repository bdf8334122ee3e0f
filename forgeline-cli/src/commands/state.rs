//! `forgeline state`

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use forgeline_runner::{Config, StateStore};

use crate::output;

/// Checkpoint subcommands
#[derive(Subcommand)]
pub enum StateCommands {
    /// Show the checkpoint
    Show {
        /// Print the raw checkpoint as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the checkpoint so the next run starts fresh
    Clear,
}

/// Handle state commands
pub async fn handle_state_command(command: StateCommands, config: &Config) -> Result<()> {
    let store = StateStore::new(&config.state_file);

    match command {
        StateCommands::Show { json } => show_state(&store, json),
        StateCommands::Clear => clear_state(&store),
    }
}

fn show_state(store: &StateStore, json: bool) -> Result<()> {
    let Some(state) = store.load()? else {
        println!(
            "{}",
            format!("No checkpoint at {}", store.path().display()).yellow()
        );
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("{}", format!("Checkpoint {}", store.path().display()).bold());
    output::field("Run", state.run_id.to_string().cyan());
    output::field(
        "Completed",
        state.last_completed_stage.as_deref().unwrap_or("none"),
    );
    output::field(
        "Status",
        if state.terminal {
            "finished".green()
        } else {
            "resumable".yellow()
        },
    );
    output::field("Blueprint", state.source_path.display());
    output::field("Schema", &state.schema_version);
    output::field("Created", state.created_at.to_rfc3339().dimmed());
    output::field("Updated", state.updated_at.to_rfc3339().dimmed());
    Ok(())
}

fn clear_state(store: &StateStore) -> Result<()> {
    let _lock = store.lock()?;
    store.remove()?;
    println!(
        "{}",
        format!("✓ Checkpoint {} cleared", store.path().display()).green().bold()
    );
    Ok(())
}
