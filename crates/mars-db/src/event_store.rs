//! Game and game event table operations.
//!
//! `game_events` is the durable log: rows are only ever inserted, and a
//! game is replayed by reading its rows in ascending `id` order. `games`
//! holds one status row per game, stamped once the game is finalized.

use chrono::{DateTime, Utc};
use mars_game::PendingEvent;
use mars_types::{GameEventId, GameEventRecord, GameId, PersistMetadata, Phase};
use sqlx::PgPool;

use crate::error::DbError;

/// Status of a game that has not been finalized.
pub const STATUS_INCOMPLETE: &str = "incomplete";

/// Operations on the `game_events` table.
#[derive(Debug, Clone, Copy)]
pub struct GameEventStore<'a> {
    pool: &'a PgPool,
}

impl<'a> GameEventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one batch in a single transaction.
    ///
    /// Uses one `INSERT ... SELECT FROM UNNEST` so the batch costs a single
    /// round-trip. Either every event gets a row or none does. Returns the
    /// new records in batch order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_batch(
        &self,
        metadata: &PersistMetadata,
        events: &[PendingEvent],
    ) -> Result<Vec<GameEventRecord>, DbError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut types = Vec::with_capacity(events.len());
        let mut payloads = Vec::with_capacity(events.len());
        for event in events {
            types.push(event.event_type.clone());
            payloads.push(event.payload.clone());
        }
        let time_remaining = i32::try_from(metadata.time_remaining).unwrap_or(i32::MAX);

        let mut tx = self.pool.begin().await?;
        // Rows are inserted in ordinality order, so sorted ids line up with
        // the batch.
        let mut ids: Vec<i64> = sqlx::query_scalar(
            r"INSERT INTO game_events (game_id, type, payload, date_created, time_remaining)
              SELECT $1, t.type, t.payload, $4, $5
              FROM UNNEST($2::TEXT[], $3::JSONB[]) WITH ORDINALITY AS t(type, payload, ord)
              ORDER BY t.ord
              RETURNING id",
        )
        .bind(metadata.game_id.into_inner())
        .bind(&types)
        .bind(&payloads)
        .bind(metadata.date_created)
        .bind(time_remaining)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        ids.sort_unstable();
        let records = ids
            .into_iter()
            .zip(types.into_iter().zip(payloads))
            .map(|(id, (event_type, payload))| GameEventRecord {
                id: GameEventId::new(id),
                event_type,
                payload,
                game_id: metadata.game_id,
                date_created: metadata.date_created,
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            game_id = %metadata.game_id,
            count = records.len(),
            "Inserted game events (batch UNNEST)"
        );
        Ok(records)
    }

    /// All events of a game in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn events_for_game(&self, game_id: GameId) -> Result<Vec<GameEventRow>, DbError> {
        let rows = sqlx::query_as::<_, GameEventRow>(
            r"SELECT id, game_id, type AS event_type, payload, date_created, time_remaining
              FROM game_events
              WHERE game_id = $1
              ORDER BY id",
        )
        .bind(game_id.into_inner())
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

/// A row from the `game_events` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GameEventRow {
    /// Durable sequence number.
    pub id: i64,
    /// Owning game.
    pub game_id: i64,
    /// Event type tag.
    pub event_type: String,
    /// Type-specific payload.
    pub payload: serde_json::Value,
    /// When the batch was produced.
    pub date_created: DateTime<Utc>,
    /// Seconds left on the phase timer when the batch was produced.
    pub time_remaining: i32,
}

impl From<GameEventRow> for GameEventRecord {
    fn from(row: GameEventRow) -> Self {
        Self {
            id: GameEventId::new(row.id),
            event_type: row.event_type,
            payload: row.payload,
            game_id: GameId::new(row.game_id),
            date_created: row.date_created,
        }
    }
}

/// Operations on the `games` table.
#[derive(Debug, Clone, Copy)]
pub struct GameStore<'a> {
    pool: &'a PgPool,
}

impl<'a> GameStore<'a> {
    /// Create a new game store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a game row and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn create(&self) -> Result<GameId, DbError> {
        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO games (status, date_created) VALUES ($1, now()) RETURNING id",
        )
        .bind(STATUS_INCOMPLETE)
        .fetch_one(self.pool)
        .await?;
        tracing::debug!(game_id = id, "Created game row");
        Ok(GameId::new(id))
    }

    /// Fetch a game row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, game_id: GameId) -> Result<Option<GameRow>, DbError> {
        let row = sqlx::query_as::<_, GameRow>(
            r"SELECT id, status, finalized_phase, date_created, date_finalized
              FROM games
              WHERE id = $1",
        )
        .bind(game_id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Whether the game has been stamped finalized. Unknown games are not.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn is_finalized(&self, game_id: GameId) -> Result<bool, DbError> {
        let finalized: Option<bool> = sqlx::query_scalar(
            r"SELECT date_finalized IS NOT NULL FROM games WHERE id = $1",
        )
        .bind(game_id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        Ok(finalized.unwrap_or(false))
    }

    /// Stamp the game finalized with its terminal phase.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the game row does not exist, or
    /// [`DbError::Postgres`] if the update fails.
    pub async fn mark_finalized(&self, game_id: GameId, phase: Phase) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE games
              SET status = $2, finalized_phase = $2, date_finalized = now()
              WHERE id = $1",
        )
        .bind(game_id.into_inner())
        .bind(phase.to_string())
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::InvalidValue(format!("no game row for id {game_id}")));
        }
        tracing::info!(game_id = %game_id, phase = %phase, "Game finalized");
        Ok(())
    }
}

/// A row from the `games` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GameRow {
    /// Game id.
    pub id: i64,
    /// `incomplete`, `victory`, or `defeat`.
    pub status: String,
    /// Terminal phase recorded at finalization.
    pub finalized_phase: Option<String>,
    /// When the game was created.
    pub date_created: DateTime<Utc>,
    /// When the game was finalized.
    pub date_finalized: Option<DateTime<Utc>>,
}
