//! Durable event log abstraction, the batching persister, and game-level
//! finalization.
//!
//! [`EventLog`] is the storage seam: `mars-db` implements it on
//! `PostgreSQL`, [`MemoryEventLog`] implements it in process. The
//! [`Persister`] sits in front of a log and owns the write discipline:
//!
//! - `persist` encodes one batch and appends it in a single atomic write.
//!   A batch that fails stays buffered and is retried by the next write.
//! - `sync` writes anything still buffered and hands back every record
//!   written since the previous sync, advancing the durable cursor.
//! - `finalize` records the missing terminal event of a game exactly once,
//!   under a per-game lock.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use mars_types::{GameEventId, GameEventRecord, GameId, PersistMetadata, Phase};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::{GameError, PersistenceError};
use crate::game_event::{GameEvent, PendingEvent};
use crate::marsevents::EventRegistry;
use crate::replay::GameReplayer;

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// Append-only storage for game event records.
pub trait EventLog: Send + Sync {
    /// Held while a game is being finalized. Dropping it releases the lock.
    type FinalizeGuard: Send;

    /// Allocate a new game id.
    fn create_game(&self) -> impl Future<Output = Result<GameId, PersistenceError>> + Send;

    /// Append a batch atomically: either every event gets a record or none
    /// does. Returns the new records in sequence order.
    fn append(
        &self,
        metadata: &PersistMetadata,
        events: &[PendingEvent],
    ) -> impl Future<Output = Result<Vec<GameEventRecord>, PersistenceError>> + Send;

    /// All records of a game in ascending id order.
    fn records(
        &self,
        game_id: GameId,
    ) -> impl Future<Output = Result<Vec<GameEventRecord>, PersistenceError>> + Send;

    /// Block until no other finalizer holds `game_id`.
    fn lock_for_finalize(
        &self,
        game_id: GameId,
    ) -> impl Future<Output = Result<Self::FinalizeGuard, PersistenceError>> + Send;

    /// Whether the game has been stamped finalized.
    fn is_finalized(&self, game_id: GameId)
    -> impl Future<Output = Result<bool, PersistenceError>> + Send;

    /// Stamp the game finalized with its terminal phase.
    fn mark_finalized(
        &self,
        game_id: GameId,
        phase: Phase,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

// ---------------------------------------------------------------------------
// Persister
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Batch {
    metadata: PersistMetadata,
    events: Vec<PendingEvent>,
}

/// What [`Persister::finalize`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The game was already stamped finalized and `force` was not set.
    Skipped,
    /// The log already ended in a terminal phase. Only the stamp was written.
    AlreadyTerminal {
        /// The terminal phase found.
        phase: Phase,
    },
    /// The terminal event was appended.
    Recorded {
        /// The terminal phase entered.
        phase: Phase,
    },
}

/// Batches game events into an [`EventLog`].
#[derive(Debug)]
pub struct Persister<L> {
    log: L,
    buffer: VecDeque<Batch>,
    unsynced: Vec<GameEventRecord>,
    cursor: Option<GameEventId>,
}

impl<L: EventLog> Persister<L> {
    /// A persister writing to `log`.
    pub const fn new(log: L) -> Self {
        Self {
            log,
            buffer: VecDeque::new(),
            unsynced: Vec::new(),
            cursor: None,
        }
    }

    /// The underlying log.
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Id of the last record handed out by [`Persister::sync`].
    pub const fn cursor(&self) -> Option<GameEventId> {
        self.cursor
    }

    /// Batches waiting to be written.
    pub fn buffered_batches(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the most recently buffered batch without writing it. Earlier
    /// batches stay queued. Returns whether a batch was dropped.
    pub fn discard_last(&mut self) -> bool {
        let dropped = self.buffer.pop_back();
        if let Some(batch) = &dropped {
            warn!(
                game_id = %batch.metadata.game_id,
                events = batch.events.len(),
                "discarding unwritten event batch"
            );
        }
        dropped.is_some()
    }

    /// Encode `events` as one batch and write it durably.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Encode`] if an event cannot be encoded (nothing
    /// is buffered), or the log's error if the write fails (the batch
    /// stays buffered).
    pub async fn persist(
        &mut self,
        events: &[GameEvent],
        metadata: PersistMetadata,
    ) -> Result<(), PersistenceError> {
        let encoded = events
            .iter()
            .map(GameEvent::to_pending)
            .collect::<Result<Vec<_>, _>>()?;
        self.buffer.push_back(Batch {
            metadata,
            events: encoded,
        });
        self.write_buffered().await
    }

    /// Write buffered batches, then return every record written since the
    /// last sync and advance the cursor past them.
    ///
    /// # Errors
    ///
    /// The log's error if a buffered batch still cannot be written.
    pub async fn sync(&mut self) -> Result<Vec<GameEventRecord>, PersistenceError> {
        self.write_buffered().await?;
        let flushed = core::mem::take(&mut self.unsynced);
        if let Some(last) = flushed.last() {
            self.cursor = Some(last.id);
            debug!(cursor = %last.id, records = flushed.len(), "event log synced");
        }
        Ok(flushed)
    }

    async fn write_buffered(&mut self) -> Result<(), PersistenceError> {
        while let Some(batch) = self.buffer.front() {
            let records = self.log.append(&batch.metadata, &batch.events).await?;
            debug!(
                game_id = %batch.metadata.game_id,
                events = records.len(),
                "persisted event batch"
            );
            self.unsynced.extend(records);
            self.buffer.pop_front();
        }
        Ok(())
    }

    /// Record the terminal event of a game if it is missing.
    ///
    /// Replays the log under the log's per-game finalize lock. A game that
    /// already ended is only stamped. Otherwise defeat is recorded when
    /// system health is at the floor, victory when the final round has been
    /// reached. Without `force`, a game already stamped finalized is
    /// skipped without replaying.
    ///
    /// # Errors
    ///
    /// [`GameError::IndeterminateFinalization`] if neither outcome applies,
    /// any replay error, or [`GameError::Persistence`].
    pub async fn finalize(
        &mut self,
        game_id: GameId,
        force: bool,
        registry: &EventRegistry,
    ) -> Result<FinalizeOutcome, GameError> {
        let _guard = self.log.lock_for_finalize(game_id).await?;

        if !force && self.log.is_finalized(game_id).await? {
            info!(game_id = %game_id, "game already finalized, skipping");
            return Ok(FinalizeOutcome::Skipped);
        }

        let records = self.log.records(game_id).await?;
        let mut state = GameReplayer::new(game_id, records, registry).end_state()?;

        if state.phase().is_terminal() {
            self.log.mark_finalized(game_id, state.phase()).await?;
            info!(game_id = %game_id, phase = %state.phase(), "game already terminal");
            return Ok(FinalizeOutcome::AlreadyTerminal {
                phase: state.phase(),
            });
        }

        let terminal = if state.at_health_floor() {
            GameEvent::EnteredDefeatPhase {
                scores: state.scores(),
            }
        } else if state.round() >= state.max_round() {
            GameEvent::EnteredVictoryPhase {
                scores: state.scores(),
            }
        } else {
            return Err(GameError::IndeterminateFinalization {
                game_id,
                round: state.round(),
                max_round: state.max_round(),
                system_health: state.system_health(),
            });
        };
        terminal.apply(&mut state, registry)?;

        let metadata = PersistMetadata {
            game_id,
            date_created: Utc::now(),
            time_remaining: 0,
        };
        // A retry rebuilds the terminal event from the log, so a batch that
        // failed here must not stay queued behind it.
        if let Err(err) = self.persist(core::slice::from_ref(&terminal), metadata).await {
            self.discard_last();
            return Err(err.into());
        }
        self.sync().await?;
        self.log.mark_finalized(game_id, state.phase()).await?;
        info!(game_id = %game_id, phase = %state.phase(), "game finalized");
        Ok(FinalizeOutcome::Recorded {
            phase: state.phase(),
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory log
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryStore {
    records: Vec<GameEventRecord>,
    next_record: i64,
    next_game: i64,
    finalized: BTreeMap<GameId, Phase>,
}

/// An [`EventLog`] held in process memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    store: Arc<Mutex<MemoryStore>>,
    finalize_locks: Arc<Mutex<BTreeMap<GameId, Arc<Mutex<()>>>>>,
}

impl MemoryEventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record of every game, in append order.
    pub async fn all_records(&self) -> Vec<GameEventRecord> {
        self.store.lock().await.records.clone()
    }
}

impl EventLog for MemoryEventLog {
    type FinalizeGuard = OwnedMutexGuard<()>;

    async fn create_game(&self) -> Result<GameId, PersistenceError> {
        let mut store = self.store.lock().await;
        store.next_game = store.next_game.saturating_add(1);
        Ok(GameId::new(store.next_game))
    }

    async fn append(
        &self,
        metadata: &PersistMetadata,
        events: &[PendingEvent],
    ) -> Result<Vec<GameEventRecord>, PersistenceError> {
        let mut store = self.store.lock().await;
        let mut written = Vec::with_capacity(events.len());
        for event in events {
            store.next_record = store.next_record.saturating_add(1);
            written.push(GameEventRecord {
                id: GameEventId::new(store.next_record),
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                game_id: metadata.game_id,
                date_created: metadata.date_created,
            });
        }
        store.records.extend(written.iter().cloned());
        Ok(written)
    }

    async fn records(&self, game_id: GameId) -> Result<Vec<GameEventRecord>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .records
            .iter()
            .filter(|r| r.game_id == game_id)
            .cloned()
            .collect())
    }

    async fn lock_for_finalize(
        &self,
        game_id: GameId,
    ) -> Result<OwnedMutexGuard<()>, PersistenceError> {
        let lock = {
            let mut locks = self.finalize_locks.lock().await;
            Arc::clone(locks.entry(game_id).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    async fn is_finalized(&self, game_id: GameId) -> Result<bool, PersistenceError> {
        Ok(self.store.lock().await.finalized.contains_key(&game_id))
    }

    async fn mark_finalized(&self, game_id: GameId, phase: Phase) -> Result<(), PersistenceError> {
        self.store.lock().await.finalized.insert(game_id, phase);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// A [`MemoryEventLog`] whose appends can be made to fail.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyLog {
    pub(crate) inner: MemoryEventLog,
    pub(crate) failing: Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl FlakyLog {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl EventLog for FlakyLog {
    type FinalizeGuard = OwnedMutexGuard<()>;

    async fn create_game(&self) -> Result<GameId, PersistenceError> {
        self.inner.create_game().await
    }

    async fn append(
        &self,
        metadata: &PersistMetadata,
        events: &[PendingEvent],
    ) -> Result<Vec<GameEventRecord>, PersistenceError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PersistenceError::Write {
                reason: "log unavailable".to_owned(),
            });
        }
        self.inner.append(metadata, events).await
    }

    async fn records(&self, game_id: GameId) -> Result<Vec<GameEventRecord>, PersistenceError> {
        self.inner.records(game_id).await
    }

    async fn lock_for_finalize(
        &self,
        game_id: GameId,
    ) -> Result<OwnedMutexGuard<()>, PersistenceError> {
        self.inner.lock_for_finalize(game_id).await
    }

    async fn is_finalized(&self, game_id: GameId) -> Result<bool, PersistenceError> {
        self.inner.is_finalized(game_id).await
    }

    async fn mark_finalized(&self, game_id: GameId, phase: Phase) -> Result<(), PersistenceError> {
        self.inner.mark_finalized(game_id, phase).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mars_types::{MarsEventSerialized, Role};

    use super::*;
    use crate::config::GameConfig;
    use crate::marsevents::builtin;

    fn metadata(game_id: GameId) -> PersistMetadata {
        PersistMetadata {
            game_id,
            date_created: Utc::now(),
            time_remaining: 30,
        }
    }

    fn config(max_round: u32) -> GameConfig {
        GameConfig {
            max_round,
            ..GameConfig::default()
        }
    }

    /// Persist a game's initialization followed by `events`, one batch.
    async fn seed<L: EventLog>(persister: &mut Persister<L>, max_round: u32, events: &[GameEvent]) -> GameId {
        let game_id = persister.log().create_game().await.unwrap();
        let mut batch = vec![GameEvent::GameInitialized {
            config: config(max_round),
        }];
        batch.extend_from_slice(events);
        persister.persist(&batch, metadata(game_id)).await.unwrap();
        persister.sync().await.unwrap();
        game_id
    }

    fn one_round() -> Vec<GameEvent> {
        vec![
            GameEvent::EnteredMarsEventPhase {
                events: vec![MarsEventSerialized::stateless("LifeAsUsual")],
            },
            GameEvent::FinalizedMarsEvent,
            GameEvent::EnteredTradePhase,
            GameEvent::EnteredDiscardPhase,
        ]
    }

    async fn terminal_count(log: &MemoryEventLog, game_id: GameId) -> usize {
        log.records(game_id)
            .await
            .unwrap()
            .iter()
            .filter(|r| r.event_type.starts_with("enteredVictory") || r.event_type.starts_with("enteredDefeat"))
            .count()
    }

    #[tokio::test]
    async fn sync_advances_cursor() {
        let mut persister = Persister::new(MemoryEventLog::new());
        assert_eq!(persister.cursor(), None);
        let game_id = persister.log().create_game().await.unwrap();
        persister
            .persist(&[GameEvent::GameInitialized { config: config(1) }], metadata(game_id))
            .await
            .unwrap();
        persister
            .persist(&[GameEvent::EnteredTradePhase], metadata(game_id))
            .await
            .unwrap();
        let flushed = persister.sync().await.unwrap();
        assert_eq!(flushed.len(), 2);
        assert_eq!(persister.cursor(), flushed.last().map(|r| r.id));
        assert!(persister.sync().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_stays_buffered_until_retry() {
        let log = FlakyLog::default();
        let mut persister = Persister::new(log.clone());
        let game_id = log.create_game().await.unwrap();
        log.set_failing(true);
        let err = persister
            .persist(&[GameEvent::GameInitialized { config: config(1) }], metadata(game_id))
            .await;
        assert!(err.is_err());
        assert_eq!(persister.buffered_batches(), 1);
        assert!(log.inner.all_records().await.is_empty());

        log.set_failing(false);
        let flushed = persister.sync().await.unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(persister.buffered_batches(), 0);
    }

    #[tokio::test]
    async fn finalize_records_victory_once() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let game_id = seed(&mut persister, 1, &one_round()).await;

        let first = persister.finalize(game_id, false, builtin()).await.unwrap();
        assert_eq!(first, FinalizeOutcome::Recorded { phase: Phase::Victory });
        let second = persister.finalize(game_id, false, builtin()).await.unwrap();
        assert_eq!(second, FinalizeOutcome::Skipped);
        let forced = persister.finalize(game_id, true, builtin()).await.unwrap();
        assert_eq!(forced, FinalizeOutcome::AlreadyTerminal { phase: Phase::Victory });

        assert_eq!(terminal_count(&log, game_id).await, 1);
    }

    #[tokio::test]
    async fn finalize_records_defeat_at_floor() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let mut events = vec![GameEvent::EnteredMarsEventPhase {
            events: vec![MarsEventSerialized::stateless("CropFailure"); 5],
        }];
        events.extend(std::iter::repeat_n(GameEvent::FinalizedMarsEvent, 5));
        let game_id = seed(&mut persister, 8, &events).await;

        let outcome = persister.finalize(game_id, false, builtin()).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::Recorded { phase: Phase::Defeat });
        assert_eq!(terminal_count(&log, game_id).await, 1);
    }

    #[tokio::test]
    async fn finalize_mid_game_is_indeterminate() {
        let mut persister = Persister::new(MemoryEventLog::new());
        let game_id = seed(&mut persister, 8, &one_round()).await;
        let err = persister.finalize(game_id, false, builtin()).await.unwrap_err();
        assert!(matches!(err, GameError::IndeterminateFinalization { round: 1, max_round: 8, .. }));
        assert!(!persister.log().is_finalized(game_id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_finalizers_append_one_terminal_event() {
        let log = MemoryEventLog::new();
        let mut seeder = Persister::new(log.clone());
        let game_id = seed(&mut seeder, 1, &one_round()).await;

        let mut a = Persister::new(log.clone());
        let mut b = Persister::new(log.clone());
        let (ra, rb) = tokio::join!(
            a.finalize(game_id, true, builtin()),
            b.finalize(game_id, true, builtin())
        );
        let mut outcomes = vec![ra.unwrap(), rb.unwrap()];
        outcomes.sort_by_key(|o| matches!(o, FinalizeOutcome::Recorded { .. }));
        assert_eq!(
            outcomes,
            vec![
                FinalizeOutcome::AlreadyTerminal { phase: Phase::Victory },
                FinalizeOutcome::Recorded { phase: Phase::Victory },
            ]
        );
        assert_eq!(terminal_count(&log, game_id).await, 1);
    }

    #[tokio::test]
    async fn finalize_retry_after_failed_write_records_one_terminal_event() {
        let log = FlakyLog::default();
        let mut persister = Persister::new(log.clone());
        let game_id = seed(&mut persister, 1, &one_round()).await;

        log.set_failing(true);
        let err = persister.finalize(game_id, false, builtin()).await.unwrap_err();
        assert!(matches!(err, GameError::Persistence { .. }));
        assert_eq!(persister.buffered_batches(), 0);
        assert!(!log.is_finalized(game_id).await.unwrap());

        log.set_failing(false);
        let outcome = persister.finalize(game_id, false, builtin()).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::Recorded { phase: Phase::Victory });
        assert_eq!(terminal_count(&log.inner, game_id).await, 1);
    }

    #[tokio::test]
    async fn discard_last_keeps_earlier_batches() {
        let log = FlakyLog::default();
        let mut persister = Persister::new(log.clone());
        let game_id = log.create_game().await.unwrap();
        log.set_failing(true);
        for event in [GameEvent::GameInitialized { config: config(1) }, GameEvent::EnteredTradePhase] {
            assert!(persister.persist(&[event], metadata(game_id)).await.is_err());
        }
        assert_eq!(persister.buffered_batches(), 2);

        assert!(persister.discard_last());
        assert_eq!(persister.buffered_batches(), 1);

        log.set_failing(false);
        let flushed = persister.sync().await.unwrap();
        let types: Vec<&str> = flushed.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(types, vec!["gameInitialized"]);
        assert!(!persister.discard_last());
    }

    #[tokio::test]
    async fn victory_scores_are_recorded() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let game_id = seed(&mut persister, 1, &one_round()).await;
        persister.finalize(game_id, false, builtin()).await.unwrap();
        let records = log.records(game_id).await.unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.event_type, "enteredVictoryPhase");
        let curator = last
            .payload
            .get("scores")
            .and_then(|scores| scores.get(Role::Curator.as_str()));
        assert_eq!(curator, Some(&serde_json::json!(0)));
    }
}
