//! Operator binary for Port of Mars.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration from `mars-config.yaml` (defaults if absent)
//! 3. Initialize structured logging (tracing)
//! 4. Run the subcommand
//!
//! Any failure exits with status 1. A game that cannot be finalized yet is
//! reported as a warning rather than an error trace.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use mars_game::{GameError, MarsConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match commands::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    match commands::run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(GameError::IndeterminateFinalization {
                game_id,
                round,
                max_round,
                system_health,
            }) = err.downcast_ref::<GameError>()
            {
                tracing::warn!(
                    game_id = %game_id,
                    round,
                    max_round,
                    system_health,
                    "game is still in progress, not finalized"
                );
            } else {
                tracing::error!(error = format!("{err:#}"), "command failed");
            }
            ExitCode::FAILURE
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &MarsConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
