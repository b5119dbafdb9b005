//! Event-sourced game core for Port of Mars.
//!
//! Every change to a game is a [`GameEvent`]. The live session stages each
//! batch on a copy of the state, writes it to an append-only [`EventLog`],
//! and only then commits it. Replay applies the same events with the same
//! code, so a game's log fully determines its state.
//!
//! ```text
//! CommandEnvelope / advance
//!     |
//!     +-- Game::plan_* ---------> Vec<GameEvent>
//!     |
//!     +-- stage on scratch -----> GameEvent::apply (+ defeat check)
//!     |
//!     +-- Persister::persist ---> EventLog (memory or PostgreSQL)
//!     |
//!     +-- commit scratch state
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Game rules and runtime configuration from YAML
//! - [`error`] -- [`GameError`] and [`PersistenceError`]
//! - [`accomplishment`] -- Per-role accomplishment catalog and hands
//! - [`player`] -- Per-role time blocks, costs, inventory, and scoring
//! - [`state`] -- The aggregate [`GameState`]
//! - [`ordering`] -- Deferred actions and their tiered flush
//! - [`marsevents`] -- Mars event behaviors and the type registry
//! - [`game_event`] -- The [`GameEvent`] vocabulary and its `apply`
//! - [`game`] -- The live session
//! - [`replay`] -- Deterministic reconstruction from a log
//! - [`persist`] -- The [`EventLog`] seam, [`Persister`], and finalization

pub mod accomplishment;
pub mod config;
pub mod error;
pub mod game;
pub mod game_event;
pub mod marsevents;
pub mod ordering;
pub mod persist;
pub mod player;
pub mod replay;
pub mod state;

// Re-export primary types for convenience.
pub use config::{ConfigError, GameConfig, MarsConfig};
pub use error::{GameError, PersistenceError};
pub use game::{Game, MarsEventDeck, parse_command};
pub use game_event::{GameEvent, PendingEvent};
pub use marsevents::{EventRegistry, MarsEvent, builtin};
pub use persist::{EventLog, FinalizeOutcome, MemoryEventLog, Persister};
pub use replay::GameReplayer;
pub use state::{GameState, RoundEffect};
