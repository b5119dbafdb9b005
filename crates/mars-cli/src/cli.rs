//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Operator tooling for Port of Mars games.
#[derive(Debug, Parser)]
#[command(name = "mars", version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, global = true, env = "MARS_CONFIG", default_value = "mars-config.yaml")]
    pub config: PathBuf,

    /// What to do.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect or close out games stored in the event log.
    #[command(subcommand)]
    Game(GameCommand),
    /// Validate configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Apply pending database migrations.
    Migrate,
}

/// `mars game ...`
#[derive(Debug, Subcommand)]
pub enum GameCommand {
    /// Record the missing victory or defeat of a game.
    Finalize(FinalizeArgs),
    /// Rebuild a game from its log and print the end state as JSON.
    Replay {
        /// The game to replay.
        #[arg(long)]
        game_id: i64,
    },
    /// Play a game with no player input to its end, in memory.
    Simulate {
        /// Seed for the event deck. Random when omitted.
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Arguments of `mars game finalize`.
#[derive(Debug, Args)]
pub struct FinalizeArgs {
    /// The game to finalize.
    #[arg(long)]
    pub game_id: i64,
    /// Replay and stamp even if the game is already marked finalized.
    #[arg(long)]
    pub force: bool,
}

/// `mars config ...`
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse and validate the configuration, then print the game rules.
    Check,
}
