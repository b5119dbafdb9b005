//! The core [`EventLog`] on `PostgreSQL`.
//!
//! Appends go through [`GameEventStore::insert_batch`], one transaction per
//! batch. Finalizers of the same game are serialized with a transaction
//! scoped advisory lock keyed on the game id: the guard is the open
//! transaction, and dropping it rolls back and releases the lock. The
//! status stamp is written on a separate pool connection, which the
//! advisory lock does not block.

use mars_game::{EventLog, PendingEvent, PersistenceError};
use mars_types::{GameEventRecord, GameId, PersistMetadata, Phase};
use sqlx::{Postgres, Transaction};

use crate::error::DbError;
use crate::event_store::{GameEventStore, GameStore};
use crate::postgres::PostgresPool;

/// A `PostgreSQL`-backed event log.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PostgresPool,
}

impl PgEventLog {
    /// An event log over an already migrated pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    async fn acquire_finalize_lock(
        &self,
        game_id: GameId,
    ) -> Result<Transaction<'static, Postgres>, DbError> {
        let mut tx = self.pool.pool().begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(game_id.into_inner())
            .execute(&mut *tx)
            .await?;
        tracing::debug!(game_id = %game_id, "Acquired finalize lock");
        Ok(tx)
    }
}

impl EventLog for PgEventLog {
    type FinalizeGuard = Transaction<'static, Postgres>;

    async fn create_game(&self) -> Result<GameId, PersistenceError> {
        GameStore::new(self.pool.pool())
            .create()
            .await
            .map_err(DbError::into_write)
    }

    async fn append(
        &self,
        metadata: &PersistMetadata,
        events: &[PendingEvent],
    ) -> Result<Vec<GameEventRecord>, PersistenceError> {
        GameEventStore::new(self.pool.pool())
            .insert_batch(metadata, events)
            .await
            .map_err(DbError::into_write)
    }

    async fn records(&self, game_id: GameId) -> Result<Vec<GameEventRecord>, PersistenceError> {
        let rows = GameEventStore::new(self.pool.pool())
            .events_for_game(game_id)
            .await
            .map_err(DbError::into_read)?;
        Ok(rows.into_iter().map(GameEventRecord::from).collect())
    }

    async fn lock_for_finalize(
        &self,
        game_id: GameId,
    ) -> Result<Self::FinalizeGuard, PersistenceError> {
        self.acquire_finalize_lock(game_id)
            .await
            .map_err(DbError::into_read)
    }

    async fn is_finalized(&self, game_id: GameId) -> Result<bool, PersistenceError> {
        GameStore::new(self.pool.pool())
            .is_finalized(game_id)
            .await
            .map_err(DbError::into_read)
    }

    async fn mark_finalized(&self, game_id: GameId, phase: Phase) -> Result<(), PersistenceError> {
        GameStore::new(self.pool.pool())
            .mark_finalized(game_id, phase)
            .await
            .map_err(DbError::into_write)
    }
}
