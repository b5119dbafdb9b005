//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use mars_db::{PgEventLog, PostgresPool};
use mars_game::{
    EventLog, FinalizeOutcome, Game, GameConfig, GameReplayer, GameState, MarsConfig,
    MemoryEventLog, Persister, builtin,
};
use mars_types::GameId;
use tracing::info;

use crate::cli::{Commands, ConfigCommand, FinalizeArgs, GameCommand};

/// Load the configuration file, or defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<MarsConfig> {
    if path.exists() {
        MarsConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        MarsConfig::parse("{}").context("loading default configuration")
    }
}

/// Dispatch a subcommand.
pub async fn run(command: Commands, config: &MarsConfig) -> Result<()> {
    match command {
        Commands::Game(GameCommand::Finalize(args)) => finalize(config, &args).await,
        Commands::Game(GameCommand::Replay { game_id }) => {
            replay(config, GameId::new(game_id)).await
        }
        Commands::Game(GameCommand::Simulate { seed }) => {
            let state = simulate(&config.game, seed).await?;
            print_summary(&state)
        }
        Commands::Config(ConfigCommand::Check) => check_config(config),
        Commands::Migrate => {
            let pool = connect(config).await?;
            pool.run_migrations().await?;
            pool.close().await;
            Ok(())
        }
    }
}

async fn connect(config: &MarsConfig) -> Result<PostgresPool> {
    PostgresPool::connect(&config.database)
        .await
        .context("connecting to PostgreSQL")
}

async fn finalize(config: &MarsConfig, args: &FinalizeArgs) -> Result<()> {
    let pool = connect(config).await?;
    let mut persister = Persister::new(PgEventLog::new(pool.clone()));
    let game_id = GameId::new(args.game_id);
    // Left without context so `main` can recognise an unfinished game.
    let outcome = persister.finalize(game_id, args.force, builtin()).await?;
    match outcome {
        FinalizeOutcome::Skipped => info!(game_id = %game_id, "already finalized"),
        FinalizeOutcome::AlreadyTerminal { phase } => {
            info!(game_id = %game_id, phase = %phase, "log already terminal, stamped");
        }
        FinalizeOutcome::Recorded { phase } => {
            info!(game_id = %game_id, phase = %phase, "terminal event recorded");
        }
    }
    pool.close().await;
    Ok(())
}

async fn replay(config: &MarsConfig, game_id: GameId) -> Result<()> {
    let pool = connect(config).await?;
    let records = PgEventLog::new(pool.clone())
        .records(game_id)
        .await
        .with_context(|| format!("reading game {game_id}"))?;
    pool.close().await;
    if records.is_empty() {
        bail!("game {game_id} has no records");
    }
    let state = GameReplayer::new(game_id, records, builtin())
        .end_state()
        .with_context(|| format!("replaying game {game_id}"))?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Advance a fresh in-memory game until it ends.
pub async fn simulate(config: &GameConfig, seed: Option<u64>) -> Result<GameState> {
    let mut persister = Persister::new(MemoryEventLog::new());
    let mut game = Game::create(&mut persister, config.clone(), builtin(), seed).await?;
    while !game.state().phase().is_terminal() {
        game.advance_phase(&mut persister, 0).await?;
    }
    let records = persister.sync().await?;
    info!(
        game_id = %game.id(),
        records = records.len(),
        phase = %game.state().phase(),
        "simulation finished"
    );
    Ok(game.state().clone())
}

fn print_summary(state: &GameState) -> Result<()> {
    for message in state.logs() {
        println!("[round {}] {}: {}", message.round, message.category, message.content);
    }
    println!("{}", serde_json::to_string_pretty(&state.scores())?);
    Ok(())
}

fn check_config(config: &MarsConfig) -> Result<()> {
    let deck_size: u32 = config.game.event_deck.iter().map(|e| e.copies).fold(0, u32::saturating_add);
    info!(
        max_round = config.game.max_round,
        deck_size,
        database = %config.database.url,
        "configuration is valid"
    );
    println!("{}", serde_json::to_string_pretty(&config.game)?);
    Ok(())
}
