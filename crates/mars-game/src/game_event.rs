//! Domain game events: the facts written to the durable log.
//!
//! A [`GameEvent`] is produced by the live session after validating a
//! command or a phase advance, and is applied to a [`GameState`] by
//! [`GameEvent::apply`]. Replay applies the very same function to events
//! decoded from records, so live and replayed states cannot diverge.
//!
//! Wire form mirrors [`GameEventRecord`]: `{ "type": "...", "payload": {...} }`.

use std::collections::BTreeMap;

use mars_types::{
    AccomplishmentId, EventResponse, GameEventRecord, Investment, MarsEventSerialized,
    MarsLogCategory, Phase, ResourceAmount, Role,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::marsevents::{EventRegistry, MarsEvent};
use crate::ordering::flush;
use crate::state::GameState;

/// Seed for the random source handed to factories while applying events.
/// Persisted event data already fixes every random choice, so the value is
/// irrelevant as long as it is constant.
const APPLY_SEED: u64 = 0;

/// Something that happened in a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GameEvent {
    /// The game was created with these rules. Always the first record.
    GameInitialized {
        /// Rules of the game.
        config: GameConfig,
    },
    /// A new round began.
    EnteredInvestPhase,
    /// A player spent time blocks.
    TimeInvested {
        /// The investing player.
        role: Role,
        /// What was bought.
        investment: Investment,
        /// How many units.
        units: u32,
    },
    /// Investments were committed and this round's Mars events drawn.
    EnteredMarsEventPhase {
        /// The drawn events, in resolution order, with their initial data.
        events: Vec<MarsEventSerialized>,
    },
    /// A player responded to the active Mars event.
    RespondedToMarsEvent {
        /// The responding player.
        role: Role,
        /// The response.
        response: EventResponse,
    },
    /// The active Mars event resolved.
    FinalizedMarsEvent,
    /// Trading opened.
    EnteredTradePhase,
    /// Two players exchanged resources.
    ResourcesTraded {
        /// The proposing player.
        from: Role,
        /// The counterparty.
        to: Role,
        /// What `from` gave.
        give: ResourceAmount,
        /// What `from` received.
        take: ResourceAmount,
    },
    /// Purchases and discards opened.
    EnteredDiscardPhase,
    /// A player bought an accomplishment.
    PurchasedAccomplishment {
        /// The buyer.
        role: Role,
        /// The card.
        id: AccomplishmentId,
    },
    /// A player discarded an accomplishment.
    DiscardedAccomplishment {
        /// The player.
        role: Role,
        /// The card.
        id: AccomplishmentId,
    },
    /// The colony survived.
    EnteredVictoryPhase {
        /// Victory points per role at the end.
        scores: BTreeMap<Role, u32>,
    },
    /// System health collapsed.
    EnteredDefeatPhase {
        /// Victory points per role at the end.
        scores: BTreeMap<Role, u32>,
    },
}

/// Every record type tag, for recognising unknown records.
pub const EVENT_TYPES: [&str; 13] = [
    "gameInitialized",
    "enteredInvestPhase",
    "timeInvested",
    "enteredMarsEventPhase",
    "respondedToMarsEvent",
    "finalizedMarsEvent",
    "enteredTradePhase",
    "resourcesTraded",
    "enteredDiscardPhase",
    "purchasedAccomplishment",
    "discardedAccomplishment",
    "enteredVictoryPhase",
    "enteredDefeatPhase",
];

/// A game event encoded for the log, not yet assigned a sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Type tag.
    pub event_type: String,
    /// Payload, `null` for events without one.
    pub payload: serde_json::Value,
}

impl GameEvent {
    /// The record type tag.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::GameInitialized { .. } => "gameInitialized",
            Self::EnteredInvestPhase => "enteredInvestPhase",
            Self::TimeInvested { .. } => "timeInvested",
            Self::EnteredMarsEventPhase { .. } => "enteredMarsEventPhase",
            Self::RespondedToMarsEvent { .. } => "respondedToMarsEvent",
            Self::FinalizedMarsEvent => "finalizedMarsEvent",
            Self::EnteredTradePhase => "enteredTradePhase",
            Self::ResourcesTraded { .. } => "resourcesTraded",
            Self::EnteredDiscardPhase => "enteredDiscardPhase",
            Self::PurchasedAccomplishment { .. } => "purchasedAccomplishment",
            Self::DiscardedAccomplishment { .. } => "discardedAccomplishment",
            Self::EnteredVictoryPhase { .. } => "enteredVictoryPhase",
            Self::EnteredDefeatPhase { .. } => "enteredDefeatPhase",
        }
    }

    /// Whether this event puts the game in a terminal phase.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::EnteredVictoryPhase { .. } | Self::EnteredDefeatPhase { .. }
        )
    }

    /// Split into type tag and payload for the log.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be encoded.
    pub fn to_pending(&self) -> Result<PendingEvent, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        let payload = value
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        Ok(PendingEvent {
            event_type: self.event_type().to_owned(),
            payload,
        })
    }

    /// Decode a durable record.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownGameEventType`] for an unrecognised tag, or
    /// [`GameError::MalformedPayload`] if the payload does not fit the tag.
    pub fn from_record(record: &GameEventRecord) -> Result<Self, GameError> {
        Self::decode(&record.event_type, &record.payload)
    }

    /// Decode a type tag and payload.
    ///
    /// # Errors
    ///
    /// As [`GameEvent::from_record`].
    pub fn decode(event_type: &str, payload: &serde_json::Value) -> Result<Self, GameError> {
        if !EVENT_TYPES.contains(&event_type) {
            return Err(GameError::UnknownGameEventType {
                event_type: event_type.to_owned(),
            });
        }
        let mut wire = serde_json::Map::new();
        wire.insert("type".to_owned(), serde_json::Value::from(event_type));
        if !payload.is_null() {
            wire.insert("payload".to_owned(), payload.clone());
        }
        serde_json::from_value(serde_json::Value::Object(wire))
            .map_err(|e| GameError::malformed(event_type, e))
    }

    /// Apply this event to `state`.
    ///
    /// On error the state may be partially modified; callers apply to a
    /// scratch copy when they need all-or-nothing behavior.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidPhaseTransition`] if the event does not fit the
    /// current phase, or any rule violation the event would cause.
    pub fn apply(&self, state: &mut GameState, registry: &EventRegistry) -> Result<(), GameError> {
        let phase = state.phase();
        if phase.is_terminal() {
            return Err(GameError::wrong_phase(phase, self.event_type()));
        }
        match self {
            Self::GameInitialized { .. } => {
                return Err(GameError::wrong_phase(phase, self.event_type()));
            }
            Self::EnteredInvestPhase => {
                expect_phase(state, Phase::Discard, self)?;
                state.begin_next_round();
            }
            Self::TimeInvested {
                role,
                investment,
                units,
            } => {
                expect_phase(state, Phase::Invest, self)?;
                state.player_mut(*role).invest(*investment, *units)?;
            }
            Self::EnteredMarsEventPhase { events } => {
                expect_phase(state, Phase::Invest, self)?;
                state.commit_investments()?;
                let mut rng = StdRng::seed_from_u64(APPLY_SEED);
                let drawn = events
                    .iter()
                    .map(|e| registry.construct_serialized(e, &mut rng))
                    .collect::<Result<Vec<MarsEvent>, GameError>>()?;
                state.set_round_events(drawn);
                state.set_phase(Phase::Event);
                initialize_active(state)?;
            }
            Self::RespondedToMarsEvent { role, response } => {
                expect_phase(state, Phase::Event, self)?;
                state
                    .active_event_mut()
                    .ok_or(GameError::NoActiveEvent)?
                    .respond(*role, response)?;
            }
            Self::FinalizedMarsEvent => {
                expect_phase(state, Phase::Event, self)?;
                finalize_active(state)?;
            }
            Self::EnteredTradePhase => {
                expect_phase(state, Phase::Event, self)?;
                if !state.all_events_finalized() {
                    return Err(GameError::wrong_phase(
                        phase,
                        "enteredTradePhase with unresolved mars events",
                    ));
                }
                state.set_phase(Phase::Trade);
            }
            Self::ResourcesTraded {
                from,
                to,
                give,
                take,
            } => {
                expect_phase(state, Phase::Trade, self)?;
                apply_trade(state, *from, *to, give, take)?;
            }
            Self::EnteredDiscardPhase => {
                expect_phase(state, Phase::Trade, self)?;
                state.set_phase(Phase::Discard);
            }
            Self::PurchasedAccomplishment { role, id } => {
                expect_phase(state, Phase::Discard, self)?;
                let hand_size = state.config().accomplishment_hand_size;
                let card = state.player_mut(*role).purchase(*id, hand_size)?;
                state.log(
                    format!(
                        "The {role} purchased {} for {} victory points.",
                        card.label, card.victory_points
                    ),
                    MarsLogCategory::Purchase.label(),
                );
            }
            Self::DiscardedAccomplishment { role, id } => {
                expect_phase(state, Phase::Discard, self)?;
                let hand_size = state.config().accomplishment_hand_size;
                let card = state.player_mut(*role).discard(*id, hand_size)?;
                state.log(
                    format!("The {role} discarded {}.", card.label),
                    MarsLogCategory::Discard.label(),
                );
            }
            Self::EnteredVictoryPhase { .. } => {
                if state.at_health_floor() {
                    return Err(GameError::wrong_phase(
                        phase,
                        "enteredVictoryPhase with collapsed system health",
                    ));
                }
                state.enter_victory();
            }
            Self::EnteredDefeatPhase { .. } => {
                state.enter_defeat();
            }
        }
        Ok(())
    }
}

fn expect_phase(state: &GameState, expected: Phase, event: &GameEvent) -> Result<(), GameError> {
    if state.phase() == expected {
        Ok(())
    } else {
        Err(GameError::wrong_phase(state.phase(), event.event_type()))
    }
}

/// Run the active event's `initialize` hook, if there is an active event.
fn initialize_active(state: &mut GameState) -> Result<(), GameError> {
    let Some(mut event) = state.take_active_event() else {
        return Ok(());
    };
    let result = event.initialize(state);
    state.restore_active_event(event);
    result
}

/// Finalize the active event, flush the queue it filled, and open the next.
fn finalize_active(state: &mut GameState) -> Result<(), GameError> {
    let mut event = state.take_active_event().ok_or(GameError::NoActiveEvent)?;
    let result = event.finalize(state);
    state.restore_active_event(event);
    result?;
    flush(state);
    state.advance_active_event();
    initialize_active(state)
}

fn apply_trade(
    state: &mut GameState,
    from: Role,
    to: Role,
    give: &ResourceAmount,
    take: &ResourceAmount,
) -> Result<(), GameError> {
    validate_trade(state, from, to, give, take)?;
    let sender = state.player_mut(from);
    sender.spend(give, "trade")?;
    sender.gain(take)?;
    let receiver = state.player_mut(to);
    receiver.spend(take, "trade")?;
    receiver.gain(give)?;
    state.log(
        format!("The {from} traded with the {to}."),
        MarsLogCategory::Trade.label(),
    );
    Ok(())
}

/// Check a trade without changing anything.
///
/// # Errors
///
/// [`GameError::TradingDisabled`], [`GameError::InvalidTrade`], or
/// [`GameError::InsufficientResources`].
pub fn validate_trade(
    state: &GameState,
    from: Role,
    to: Role,
    give: &ResourceAmount,
    take: &ResourceAmount,
) -> Result<(), GameError> {
    if !state.trading_enabled() {
        return Err(GameError::TradingDisabled);
    }
    if from == to {
        return Err(GameError::InvalidTrade {
            reason: "a player cannot trade with themselves".to_owned(),
        });
    }
    if give.is_empty() && take.is_empty() {
        return Err(GameError::InvalidTrade {
            reason: "the trade exchanges nothing".to_owned(),
        });
    }
    if !state.player(from).inventory.covers(give) {
        return Err(GameError::InsufficientResources {
            role: from,
            operation: "trade".to_owned(),
        });
    }
    if !state.player(to).inventory.covers(take) {
        return Err(GameError::InsufficientResources {
            role: to,
            operation: "trade".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mars_types::{GameEventId, GameId, Resource};

    use super::*;
    use crate::marsevents::builtin;

    fn state() -> GameState {
        GameState::new(GameConfig::default())
    }

    fn apply_all(state: &mut GameState, events: &[GameEvent]) {
        for event in events {
            event.apply(state, builtin()).unwrap();
        }
    }

    fn record(event_type: &str, payload: serde_json::Value) -> GameEventRecord {
        GameEventRecord {
            id: GameEventId::new(1),
            event_type: event_type.to_owned(),
            payload,
            game_id: GameId::new(1),
            date_created: chrono::Utc::now(),
        }
    }

    #[test]
    fn unit_events_have_null_payload() {
        let pending = GameEvent::FinalizedMarsEvent.to_pending().unwrap();
        assert_eq!(pending.event_type, "finalizedMarsEvent");
        assert!(pending.payload.is_null());
        let back = GameEvent::decode(&pending.event_type, &pending.payload).unwrap();
        assert_eq!(back, GameEvent::FinalizedMarsEvent);
    }

    #[test]
    fn payload_fields_are_camel_case() {
        let event = GameEvent::PurchasedAccomplishment {
            role: Role::Pioneer,
            id: AccomplishmentId::new(301),
        };
        let pending = event.to_pending().unwrap();
        assert_eq!(
            pending.payload,
            serde_json::json!({ "role": "Pioneer", "id": 301 })
        );
    }

    #[test]
    fn unknown_record_type_is_rejected() {
        let err = GameEvent::from_record(&record("teleported", serde_json::Value::Null)).unwrap_err();
        assert!(matches!(err, GameError::UnknownGameEventType { .. }));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = GameEvent::from_record(&record(
            "timeInvested",
            serde_json::json!({ "role": "Pioneer" }),
        ))
        .unwrap_err();
        assert!(matches!(err, GameError::MalformedPayload { .. }));
    }

    #[test]
    fn full_round_cycles_back_to_invest() {
        let mut s = state();
        apply_all(
            &mut s,
            &[
                GameEvent::TimeInvested {
                    role: Role::Pioneer,
                    investment: Investment::Legacy,
                    units: 2,
                },
                GameEvent::EnteredMarsEventPhase {
                    events: vec![MarsEventSerialized::stateless("Sandstorm")],
                },
                GameEvent::FinalizedMarsEvent,
                GameEvent::EnteredTradePhase,
                GameEvent::EnteredDiscardPhase,
                GameEvent::EnteredInvestPhase,
            ],
        );
        assert_eq!(s.round(), 2);
        assert_eq!(s.phase(), Phase::Invest);
        // 100 - 10 (sandstorm) - 25 (upkeep)
        assert_eq!(s.system_health(), 65);
        assert_eq!(s.player(Role::Pioneer).inventory.legacy, 2);
    }

    #[test]
    fn trade_before_all_events_resolve_is_rejected() {
        let mut s = state();
        apply_all(
            &mut s,
            &[GameEvent::EnteredMarsEventPhase {
                events: vec![MarsEventSerialized::stateless("LifeAsUsual")],
            }],
        );
        let err = GameEvent::EnteredTradePhase.apply(&mut s, builtin()).unwrap_err();
        assert!(matches!(err, GameError::InvalidPhaseTransition { .. }));
    }

    #[test]
    fn second_event_initializes_after_first_finalizes() {
        let mut s = state();
        s.player_mut(Role::Curator).inventory = ResourceAmount::single(Resource::Culture, 3);
        apply_all(
            &mut s,
            &[
                GameEvent::EnteredMarsEventPhase {
                    events: vec![
                        MarsEventSerialized::stateless("LifeAsUsual"),
                        MarsEventSerialized::stateless("BreakdownOfTrust"),
                    ],
                },
            ],
        );
        assert_eq!(s.player(Role::Curator).time_blocks, 10);
        apply_all(&mut s, &[GameEvent::FinalizedMarsEvent]);
        assert_eq!(s.player(Role::Curator).time_blocks, 2);
        assert!(s.player(Role::Curator).inventory.is_empty());
    }

    #[test]
    fn trade_moves_resources_both_ways() {
        let mut s = state();
        s.set_phase(Phase::Trade);
        s.player_mut(Role::Curator).inventory = ResourceAmount::single(Resource::Culture, 3);
        s.player_mut(Role::Pioneer).inventory = ResourceAmount::single(Resource::Legacy, 2);
        apply_all(
            &mut s,
            &[GameEvent::ResourcesTraded {
                from: Role::Curator,
                to: Role::Pioneer,
                give: ResourceAmount::single(Resource::Culture, 2),
                take: ResourceAmount::single(Resource::Legacy, 1),
            }],
        );
        assert_eq!(s.player(Role::Curator).inventory.culture, 1);
        assert_eq!(s.player(Role::Curator).inventory.legacy, 1);
        assert_eq!(s.player(Role::Pioneer).inventory.culture, 2);
        assert_eq!(s.player(Role::Pioneer).inventory.legacy, 1);
    }

    #[test]
    fn trade_is_rejected_when_disabled() {
        let mut s = state();
        s.set_phase(Phase::Trade);
        s.disable_trading();
        let err = validate_trade(
            &s,
            Role::Curator,
            Role::Pioneer,
            &ResourceAmount::default(),
            &ResourceAmount::single(Resource::Legacy, 1),
        )
        .unwrap_err();
        assert!(matches!(err, GameError::TradingDisabled));
    }

    #[test]
    fn terminal_phase_absorbs_every_event() {
        let mut s = state();
        let scores = s.scores();
        apply_all(&mut s, &[GameEvent::EnteredDefeatPhase { scores }]);
        assert_eq!(s.phase(), Phase::Defeat);
        let log_len = s.logs().len();
        for event in [
            GameEvent::TimeInvested {
                role: Role::Curator,
                investment: Investment::Upkeep,
                units: 1,
            },
            GameEvent::EnteredVictoryPhase { scores: s.scores() },
            GameEvent::EnteredDefeatPhase { scores: s.scores() },
        ] {
            let err = event.apply(&mut s, builtin()).unwrap_err();
            assert!(matches!(err, GameError::InvalidPhaseTransition { .. }));
        }
        assert_eq!(s.phase(), Phase::Defeat);
        assert_eq!(s.logs().len(), log_len);
    }
}
