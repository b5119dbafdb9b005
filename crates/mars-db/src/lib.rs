//! `PostgreSQL` data layer for the Port of Mars game core.
//!
//! Stores each game's append-only event log and its status row, and
//! implements the core [`mars_game::EventLog`] on top of them.
//!
//! ```text
//! Persister (mars-game)
//!     |
//!     +-- PgEventLog
//!         |-- GameEventStore  (batched UNNEST insert, ordered reads)
//!         |-- GameStore       (game rows, finalization stamp)
//!         +-- advisory lock   (one finalizer per game)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool
//! - [`event_store`] -- `games` and `game_events` table operations
//! - [`event_log`] -- The [`PgEventLog`] implementation of `EventLog`
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_log;
pub mod event_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use error::DbError;
pub use event_log::PgEventLog;
pub use event_store::{GameEventRow, GameEventStore, GameRow, GameStore};
pub use postgres::PostgresPool;
