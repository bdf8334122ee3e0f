//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod apply;
mod doctor;
mod stage;
mod state;

pub use state::StateCommands;

use anyhow::Result;
use clap::Subcommand;
use forgeline_runner::Config;
use std::path::PathBuf;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole workflow, resuming from the last completed stage
    Apply {
        /// Path to the blueprint YAML file
        #[arg(short, long)]
        file: PathBuf,

        /// Simulate the workflow without making any changes
        #[arg(long)]
        dry_run: bool,

        /// Keep the checkpoint after successful completion for auditing
        #[arg(long)]
        retain_state: bool,

        /// Apply the Terraform plan instead of only validating it
        #[arg(long)]
        auto_approve: bool,
    },
    /// Only copy the module and write its variables
    Scaffold {
        /// Path to the blueprint YAML file
        #[arg(short, long)]
        file: PathBuf,

        /// Print files that would be created without writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Only create the repository and push the scaffolded module
    Scm {
        /// Path to the blueprint YAML file
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
    /// Only run Terraform against the scaffolded module
    Provision {
        /// Path to the blueprint YAML file
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        dry_run: bool,

        /// Apply the Terraform plan instead of only validating it
        #[arg(long)]
        auto_approve: bool,
    },
    /// Check that a container engine and git are available
    Doctor,
    /// Inspect or discard the checkpoint
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The runner configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Apply {
            file,
            dry_run,
            retain_state,
            auto_approve,
        } => apply::run_apply(&file, dry_run, retain_state, auto_approve, config).await,
        Commands::Scaffold { file, dry_run } => {
            stage::run_single_stage(stage::SingleStage::Scaffold, &file, dry_run, false, config).await
        }
        Commands::Scm { file, dry_run } => {
            stage::run_single_stage(stage::SingleStage::Scm, &file, dry_run, false, config).await
        }
        Commands::Provision {
            file,
            dry_run,
            auto_approve,
        } => {
            stage::run_single_stage(stage::SingleStage::Provision, &file, dry_run, auto_approve, config)
                .await
        }
        Commands::Doctor => doctor::run_doctor(config).await,
        Commands::State { command } => state::handle_state_command(command, config).await,
    }
}
