//! Deterministic reconstruction of a game from its durable log.
//!
//! The first record of every game is `gameInitialized`, carrying the rules
//! the game was created with. Every later record is decoded into a
//! [`GameEvent`] and applied with the same code the live session uses, so
//! identical logs always produce identical states, log text included.

use mars_types::{GameEventRecord, GameId};

use crate::error::GameError;
use crate::game_event::GameEvent;
use crate::marsevents::EventRegistry;
use crate::state::GameState;

/// Rebuilds one game's state from its records.
#[derive(Debug)]
pub struct GameReplayer<'r> {
    game_id: GameId,
    records: Vec<GameEventRecord>,
    registry: &'r EventRegistry,
}

impl<'r> GameReplayer<'r> {
    /// A replayer over `records`, which are put in ascending id order.
    pub fn new(game_id: GameId, mut records: Vec<GameEventRecord>, registry: &'r EventRegistry) -> Self {
        records.sort_by_key(|r| r.id);
        Self {
            game_id,
            records,
            registry,
        }
    }

    /// Number of records to replay.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decode every record without applying it.
    ///
    /// # Errors
    ///
    /// [`GameError::GameMismatch`], [`GameError::UnknownGameEventType`], or
    /// [`GameError::MalformedPayload`].
    pub fn events(&self) -> Result<Vec<GameEvent>, GameError> {
        self.records
            .iter()
            .map(|record| {
                self.check_owner(record)?;
                GameEvent::from_record(record)
            })
            .collect()
    }

    /// The state after applying every record.
    ///
    /// # Errors
    ///
    /// [`GameError::MissingInitialization`] if the log does not start with
    /// `gameInitialized`, any decoding error from [`GameReplayer::events`],
    /// or the error of the first record that fails to apply.
    pub fn end_state(&self) -> Result<GameState, GameError> {
        let events = self.events()?;
        let mut events = events.into_iter();
        let mut state = match events.next() {
            Some(GameEvent::GameInitialized { config }) => GameState::new(config),
            _ => {
                return Err(GameError::MissingInitialization {
                    game_id: self.game_id,
                });
            }
        };
        for event in events {
            event.apply(&mut state, self.registry)?;
        }
        tracing::debug!(
            game_id = %self.game_id,
            records = self.records.len(),
            round = state.round(),
            phase = %state.phase(),
            "replayed game"
        );
        Ok(state)
    }

    fn check_owner(&self, record: &GameEventRecord) -> Result<(), GameError> {
        if record.game_id == self.game_id {
            Ok(())
        } else {
            Err(GameError::GameMismatch {
                expected: self.game_id,
                found: record.game_id,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mars_types::{
        EventResponse, GameEventId, Investment, MarsEventSerialized, Phase, Role,
    };

    use super::*;
    use crate::config::GameConfig;
    use crate::marsevents::builtin;

    fn records(game_id: GameId, events: &[GameEvent]) -> Vec<GameEventRecord> {
        events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let pending = event.to_pending().unwrap();
                GameEventRecord {
                    id: GameEventId::new(i64::try_from(i).unwrap()),
                    event_type: pending.event_type,
                    payload: pending.payload,
                    game_id,
                    date_created: chrono::Utc::now(),
                }
            })
            .collect()
    }

    fn sample_log() -> Vec<GameEvent> {
        vec![
            GameEvent::GameInitialized {
                config: GameConfig::default(),
            },
            GameEvent::TimeInvested {
                role: Role::Researcher,
                investment: Investment::Upkeep,
                units: 4,
            },
            GameEvent::EnteredMarsEventPhase {
                events: vec![
                    MarsEventSerialized::stateless("PersonalGain"),
                    MarsEventSerialized {
                        id: "CompulsivePhilanthropy".to_owned(),
                        data: Some(serde_json::json!({
                            "votes": {},
                            "order": ["Politician", "Curator", "Entrepreneur", "Pioneer", "Researcher"]
                        })),
                    },
                ],
            },
            GameEvent::RespondedToMarsEvent {
                role: Role::Curator,
                response: EventResponse::PersonalGainVote { vote: false },
            },
            GameEvent::FinalizedMarsEvent,
            GameEvent::FinalizedMarsEvent,
            GameEvent::EnteredTradePhase,
            GameEvent::EnteredDiscardPhase,
            GameEvent::EnteredInvestPhase,
        ]
    }

    #[test]
    fn replay_is_deterministic() {
        let id = GameId::new(5);
        let log = records(id, &sample_log());
        let a = GameReplayer::new(id, log.clone(), builtin()).end_state().unwrap();
        let b = GameReplayer::new(id, log, builtin()).end_state().unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
        assert_eq!(a.logs(), b.logs());
        assert_eq!(a.round(), 2);
        assert_eq!(a.phase(), Phase::Invest);
    }

    #[test]
    fn replay_sorts_records_by_id() {
        let id = GameId::new(5);
        let mut log = records(id, &sample_log());
        log.reverse();
        let state = GameReplayer::new(id, log, builtin()).end_state().unwrap();
        assert_eq!(state.round(), 2);
    }

    #[test]
    fn replay_rejects_foreign_records() {
        let log = records(GameId::new(6), &sample_log());
        let err = GameReplayer::new(GameId::new(5), log, builtin())
            .end_state()
            .unwrap_err();
        assert!(matches!(err, GameError::GameMismatch { .. }));
    }

    #[test]
    fn replay_requires_initialization_first() {
        let id = GameId::new(5);
        let log = records(id, &[GameEvent::EnteredTradePhase]);
        let err = GameReplayer::new(id, log, builtin()).end_state().unwrap_err();
        assert!(matches!(err, GameError::MissingInitialization { .. }));
    }

    #[test]
    fn replay_resolves_philanthropy_from_persisted_order() {
        let id = GameId::new(5);
        let state = GameReplayer::new(id, records(id, &sample_log()), builtin())
            .end_state()
            .unwrap();
        let philanthropy = state
            .logs()
            .iter()
            .find(|m| m.category == "Mars Event: Compulsive Philanthropy")
            .unwrap();
        assert!(philanthropy.content.starts_with("The Politician was voted"));
    }
}
