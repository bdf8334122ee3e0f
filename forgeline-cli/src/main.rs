//! Forgeline CLI
//!
//! Scaffolds an infrastructure module, publishes it to source control and
//! provisions it, resuming from the last completed stage after a failure.

mod blueprint;
mod commands;
mod config;
mod output;

use clap::Parser;
use commands::{Commands, handle_command};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "forgeline")]
#[command(about = "Resumable scaffold, publish and provision workflows", long_about = None)]
#[command(version)]
struct Cli {
    /// Checkpoint file for resumable runs
    #[arg(long, global = true, env = "FORGELINE_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "forgeline=debug,forgeline_runner=debug,terraform=info"
    } else {
        "forgeline=info,forgeline_runner=info,terraform=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(verbose))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match config::load(cli.state_file) {
        Ok(config) => handle_command(cli.command, &config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&e);
        std::process::exit(1);
    }
}
