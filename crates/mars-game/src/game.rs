//! The live game session.
//!
//! A [`Game`] turns player commands and server-side phase advances into
//! [`GameEvent`]s. Every step is staged on a scratch copy of the state,
//! persisted as one batch, and only then committed, so a failed write never
//! moves the live game forward. Defeat is appended to the batch as soon as
//! a staged event leaves system health at the floor.

use chrono::Utc;
use mars_types::{Command, CommandEnvelope, GameEventRecord, GameId, PersistMetadata, Phase, Role};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::game_event::GameEvent;
use crate::marsevents::EventRegistry;
use crate::persist::{EventLog, Persister};
use crate::replay::GameReplayer;
use crate::state::GameState;

// ---------------------------------------------------------------------------
// Event deck
// ---------------------------------------------------------------------------

/// The shuffled Mars event deck. Reshuffled from the full composition
/// whenever it runs out.
#[derive(Debug, Clone)]
pub struct MarsEventDeck {
    composition: Vec<String>,
    remaining: Vec<String>,
}

impl MarsEventDeck {
    /// A deck built from the configured composition.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownEventType`] if the composition names an id the
    /// registry does not know.
    pub fn new(config: &GameConfig, registry: &EventRegistry) -> Result<Self, GameError> {
        let mut composition = Vec::new();
        for entry in &config.event_deck {
            if !registry.contains(&entry.id) {
                return Err(GameError::UnknownEventType {
                    id: entry.id.clone(),
                });
            }
            for _ in 0..entry.copies {
                composition.push(entry.id.clone());
            }
        }
        Ok(Self {
            composition,
            remaining: Vec::new(),
        })
    }

    /// Cards left before the next reshuffle.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Draw the next event id, reshuffling if the deck is exhausted.
    /// Returns `None` only for an empty composition.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<String> {
        if self.remaining.is_empty() {
            self.remaining.clone_from(&self.composition);
            self.remaining.shuffle(rng);
        }
        self.remaining.pop()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Parse a raw command envelope.
///
/// # Errors
///
/// [`GameError::InvalidRole`] if the role is not one of the five roles, or
/// [`GameError::MalformedPayload`] for any other shape problem.
pub fn parse_command(raw: &str) -> Result<CommandEnvelope, GameError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| GameError::malformed("command", e))?;
    let role = value
        .get("role")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| GameError::malformed("command", "missing role"))?;
    role.parse::<Role>()
        .map_err(|e| GameError::InvalidRole { value: e.value })?;
    serde_json::from_value(value).map_err(|e| GameError::malformed("command", e))
}

/// One game in progress.
#[derive(Debug)]
pub struct Game<'r> {
    id: GameId,
    state: GameState,
    registry: &'r EventRegistry,
    deck: MarsEventDeck,
    rng: StdRng,
}

impl<'r> Game<'r> {
    /// Create a game and persist its initialization record.
    ///
    /// `seed` fixes the event-deck shuffle and every random choice made
    /// when events are drawn. `None` seeds from the operating system.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownEventType`] for a bad deck composition, or
    /// [`GameError::Persistence`] if the log fails.
    pub async fn create<L: EventLog>(
        persister: &mut Persister<L>,
        config: GameConfig,
        registry: &'r EventRegistry,
        seed: Option<u64>,
    ) -> Result<Self, GameError> {
        let deck = MarsEventDeck::new(&config, registry)?;
        let id = persister.log().create_game().await?;
        let init = GameEvent::GameInitialized {
            config: config.clone(),
        };
        let metadata = PersistMetadata {
            game_id: id,
            date_created: Utc::now(),
            time_remaining: 0,
        };
        if let Err(err) = persister.persist(&[init], metadata).await {
            persister.discard_last();
            return Err(err.into());
        }
        info!(game_id = %id, max_round = config.max_round, "game created");
        Ok(Self {
            id,
            state: GameState::new(config),
            registry,
            deck,
            rng: seeded(seed),
        })
    }

    /// Rebuild a game from its log and continue it.
    ///
    /// # Errors
    ///
    /// Any replay error, or [`GameError::UnknownEventType`] for a bad deck
    /// composition.
    pub fn resume(
        id: GameId,
        records: Vec<GameEventRecord>,
        registry: &'r EventRegistry,
        seed: Option<u64>,
    ) -> Result<Self, GameError> {
        let state = GameReplayer::new(id, records, registry).end_state()?;
        let deck = MarsEventDeck::new(state.config(), registry)?;
        Ok(Self {
            id,
            state,
            registry,
            deck,
            rng: seeded(seed),
        })
    }

    /// The game id.
    pub const fn id(&self) -> GameId {
        self.id
    }

    /// The committed state.
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// The game events a command would produce. Nothing is validated
    /// beyond the mapping; staging rejects anything the state forbids.
    pub fn plan_command(envelope: &CommandEnvelope) -> Vec<GameEvent> {
        let role = envelope.role;
        let event = match &envelope.command {
            Command::Invest { investment, units } => GameEvent::TimeInvested {
                role,
                investment: *investment,
                units: *units,
            },
            Command::RespondToEvent(response) => GameEvent::RespondedToMarsEvent {
                role,
                response: response.clone(),
            },
            Command::Trade { to, give, take } => GameEvent::ResourcesTraded {
                from: role,
                to: *to,
                give: *give,
                take: *take,
            },
            Command::PurchaseAccomplishment { id } => {
                GameEvent::PurchasedAccomplishment { role, id: *id }
            }
            Command::DiscardAccomplishment { id } => {
                GameEvent::DiscardedAccomplishment { role, id: *id }
            }
        };
        vec![event]
    }

    /// The game events that move the current phase forward, drawing Mars
    /// events from `deck` with `rng` when the event phase opens.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidPhaseTransition`] in a terminal phase, or a
    /// construction error for a drawn event.
    pub fn plan_advance(
        &self,
        deck: &mut MarsEventDeck,
        rng: &mut StdRng,
    ) -> Result<Vec<GameEvent>, GameError> {
        let state = &self.state;
        let events = match state.phase() {
            Phase::Invest => {
                let mut drawn = Vec::with_capacity(state.config().events_per_round);
                for _ in 0..state.config().events_per_round {
                    let Some(id) = deck.draw(rng) else {
                        break;
                    };
                    let event = self.registry.construct(&id, None, rng)?;
                    drawn.push(event.to_serialized()?);
                }
                vec![GameEvent::EnteredMarsEventPhase { events: drawn }]
            }
            Phase::Event => {
                let open = state
                    .mars_events()
                    .len()
                    .saturating_sub(state.active_event_index());
                match open {
                    0 => vec![GameEvent::EnteredTradePhase],
                    1 => vec![GameEvent::FinalizedMarsEvent, GameEvent::EnteredTradePhase],
                    _ => vec![GameEvent::FinalizedMarsEvent],
                }
            }
            Phase::Trade => vec![GameEvent::EnteredDiscardPhase],
            Phase::Discard if state.round() >= state.max_round() => {
                vec![GameEvent::EnteredVictoryPhase {
                    scores: state.scores(),
                }]
            }
            Phase::Discard => vec![GameEvent::EnteredInvestPhase],
            phase @ (Phase::Victory | Phase::Defeat) => {
                return Err(GameError::wrong_phase(phase, "advance_phase"));
            }
        };
        Ok(events)
    }

    /// Apply `planned` to a copy of the state. Returns the copy and the
    /// events actually applied, which end with defeat if health collapsed.
    fn stage(&self, planned: Vec<GameEvent>) -> Result<(GameState, Vec<GameEvent>), GameError> {
        let mut scratch = self.state.clone();
        let mut applied = Vec::with_capacity(planned.len());
        for event in planned {
            event.apply(&mut scratch, self.registry)?;
            applied.push(event);
            if scratch.should_enter_defeat() {
                let defeat = GameEvent::EnteredDefeatPhase {
                    scores: scratch.scores(),
                };
                defeat.apply(&mut scratch, self.registry)?;
                applied.push(defeat);
                break;
            }
        }
        Ok((scratch, applied))
    }

    /// Persist staged events, then commit the staged state.
    async fn commit<L: EventLog>(
        &mut self,
        persister: &mut Persister<L>,
        scratch: GameState,
        events: &[GameEvent],
        time_remaining: u32,
    ) -> Result<(), GameError> {
        let metadata = PersistMetadata {
            game_id: self.id,
            date_created: Utc::now(),
            time_remaining,
        };
        if let Err(err) = persister.persist(events, metadata).await {
            persister.discard_last();
            warn!(game_id = %self.id, error = %err, "persist failed, state not advanced");
            return Err(err.into());
        }
        self.state = scratch;
        Ok(())
    }

    /// Validate, persist, and apply a player command.
    ///
    /// # Errors
    ///
    /// Any rule violation (the state is unchanged), or
    /// [`GameError::Persistence`] (the state is unchanged and the command
    /// may be retried).
    pub async fn execute<L: EventLog>(
        &mut self,
        persister: &mut Persister<L>,
        envelope: &CommandEnvelope,
        time_remaining: u32,
    ) -> Result<Vec<GameEvent>, GameError> {
        let (scratch, events) = self.stage(Self::plan_command(envelope))?;
        self.commit(persister, scratch, &events, time_remaining).await?;
        debug!(
            game_id = %self.id,
            role = %envelope.role,
            round = self.state.round(),
            phase = %self.state.phase(),
            "command applied"
        );
        Ok(events)
    }

    /// Move to the next phase, persisting the transition.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidPhaseTransition`] in a terminal phase, or
    /// [`GameError::Persistence`] (the state, deck, and random source are
    /// unchanged).
    pub async fn advance_phase<L: EventLog>(
        &mut self,
        persister: &mut Persister<L>,
        time_remaining: u32,
    ) -> Result<Vec<GameEvent>, GameError> {
        let mut deck = self.deck.clone();
        let mut rng = self.rng.clone();
        let planned = self.plan_advance(&mut deck, &mut rng)?;
        let (scratch, events) = self.stage(planned)?;
        self.commit(persister, scratch, &events, time_remaining).await?;
        self.deck = deck;
        self.rng = rng;
        info!(
            game_id = %self.id,
            round = self.state.round(),
            phase = %self.state.phase(),
            system_health = self.state.system_health(),
            "phase advanced"
        );
        Ok(events)
    }
}

fn seeded(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mars_types::{EventResponse, Investment};

    use super::*;
    use crate::config::DeckEntry;
    use crate::error::PersistenceError;
    use crate::marsevents::{MarsEvent, builtin};
    use crate::persist::{FlakyLog, MemoryEventLog};

    fn config(deck: &[&str], max_round: u32) -> GameConfig {
        GameConfig {
            max_round,
            event_deck: deck
                .iter()
                .map(|id| DeckEntry {
                    id: (*id).to_owned(),
                    copies: 1,
                })
                .collect(),
            ..GameConfig::default()
        }
    }

    fn invest(role: Role, investment: Investment, units: u32) -> CommandEnvelope {
        CommandEnvelope {
            role,
            command: Command::Invest { investment, units },
        }
    }

    #[test]
    fn parse_command_reports_bad_role() {
        let raw = r#"{"role":"Astronaut","commandType":"invest","payload":{"investment":"upkeep","units":1}}"#;
        assert!(matches!(
            parse_command(raw),
            Err(GameError::InvalidRole { value }) if value == "Astronaut"
        ));
    }

    #[test]
    fn parse_command_reports_malformed_payload() {
        let raw = r#"{"role":"Curator","commandType":"respondToEvent","payload":{"kind":"personalGainVote","vote":"yes"}}"#;
        assert!(matches!(
            parse_command(raw),
            Err(GameError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn deck_rejects_unknown_ids() {
        let err = MarsEventDeck::new(&config(&["Meteor"], 3), builtin()).unwrap_err();
        assert!(matches!(err, GameError::UnknownEventType { .. }));
    }

    #[test]
    fn deck_reshuffles_when_exhausted() {
        let mut deck = MarsEventDeck::new(&config(&["Sandstorm", "Audit"], 3), builtin()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let mut drawn: Vec<String> = (0..4).filter_map(|_| deck.draw(&mut rng)).collect();
        drawn.sort();
        assert_eq!(drawn, vec!["Audit", "Audit", "Sandstorm", "Sandstorm"]);
    }

    #[tokio::test]
    async fn live_state_matches_replay() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let deck = ["PersonalGain", "CompulsivePhilanthropy", "Sandstorm"];
        let mut game = Game::create(&mut persister, config(&deck, 2), builtin(), Some(11))
            .await
            .unwrap();

        for _ in 0..2 {
            game.execute(&mut persister, &invest(Role::Pioneer, Investment::Upkeep, 3), 60)
                .await
                .unwrap();
            game.advance_phase(&mut persister, 0).await.unwrap();
            if game.state().active_event().map(MarsEvent::id) == Some("PersonalGain") {
                let vote = CommandEnvelope {
                    role: Role::Curator,
                    command: Command::RespondToEvent(EventResponse::PersonalGainVote {
                        vote: false,
                    }),
                };
                game.execute(&mut persister, &vote, 30).await.unwrap();
            }
            while game.state().phase() != Phase::Trade {
                game.advance_phase(&mut persister, 0).await.unwrap();
            }
            game.advance_phase(&mut persister, 0).await.unwrap();
            game.advance_phase(&mut persister, 0).await.unwrap();
        }
        assert_eq!(game.state().phase(), Phase::Victory);

        let records = log.records(game.id()).await.unwrap();
        let replayed = GameReplayer::new(game.id(), records, builtin())
            .end_state()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&replayed).unwrap(),
            serde_json::to_value(game.state()).unwrap()
        );
        assert_eq!(replayed.logs(), game.state().logs());
    }

    #[tokio::test]
    async fn command_in_wrong_phase_changes_nothing() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let mut game = Game::create(&mut persister, config(&["Audit"], 3), builtin(), Some(1))
            .await
            .unwrap();
        let trade = CommandEnvelope {
            role: Role::Curator,
            command: Command::Trade {
                to: Role::Pioneer,
                give: mars_types::ResourceAmount::default(),
                take: mars_types::ResourceAmount::single(mars_types::Resource::Legacy, 1),
            },
        };
        let err = game.execute(&mut persister, &trade, 0).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidPhaseTransition { .. }));
        assert_eq!(game.state().phase(), Phase::Invest);
        assert_eq!(log.records(game.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_persist_leaves_state_unchanged() {
        let log = FlakyLog::default();
        let mut persister = Persister::new(log.clone());
        let mut game = Game::create(&mut persister, config(&["Sandstorm"], 3), builtin(), Some(2))
            .await
            .unwrap();
        let before = serde_json::to_value(game.state()).unwrap();

        log.set_failing(true);
        let err = game.advance_phase(&mut persister, 0).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::Persistence {
                source: PersistenceError::Write { .. }
            }
        ));
        let err = game
            .execute(&mut persister, &invest(Role::Curator, Investment::Culture, 1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Persistence { .. }));
        assert_eq!(serde_json::to_value(game.state()).unwrap(), before);
        assert_eq!(persister.buffered_batches(), 0);

        log.set_failing(false);
        game.advance_phase(&mut persister, 0).await.unwrap();
        assert_eq!(game.state().phase(), Phase::Event);
    }

    #[tokio::test]
    async fn failed_step_keeps_earlier_unwritten_batches() {
        let log = FlakyLog::default();
        let mut persister = Persister::new(log.clone());
        let mut game = Game::create(&mut persister, config(&["Audit"], 3), builtin(), Some(6))
            .await
            .unwrap();
        let other = log.create_game().await.unwrap();

        log.set_failing(true);
        let metadata = PersistMetadata {
            game_id: other,
            date_created: Utc::now(),
            time_remaining: 0,
        };
        let queued = [GameEvent::GameInitialized {
            config: GameConfig::default(),
        }];
        assert!(persister.persist(&queued, metadata).await.is_err());
        assert_eq!(persister.buffered_batches(), 1);

        assert!(game.advance_phase(&mut persister, 0).await.is_err());
        assert_eq!(persister.buffered_batches(), 1);
        assert_eq!(game.state().phase(), Phase::Invest);

        log.set_failing(false);
        let flushed = persister.sync().await.unwrap();
        assert!(flushed.iter().all(|r| r.game_id == other));
        assert_eq!(flushed.len(), 1);
        assert_eq!(log.records(game.id()).await.unwrap().len(), 1);
    }

    /// Drive one full round of phase advances from the invest phase.
    async fn play_round<L: EventLog>(game: &mut Game<'_>, persister: &mut Persister<L>) {
        let round = game.state().round();
        while game.state().round() == round && !game.state().phase().is_terminal() {
            game.advance_phase(persister, 0).await.unwrap();
        }
    }

    #[tokio::test]
    async fn stymied_blocks_specialty_investment_next_round() {
        let mut persister = Persister::new(MemoryEventLog::new());
        let mut game = Game::create(&mut persister, config(&["Stymied"], 3), builtin(), Some(8))
            .await
            .unwrap();
        play_round(&mut game, &mut persister).await;
        assert_eq!((game.state().round(), game.state().phase()), (2, Phase::Invest));

        let specialty = Role::Curator.specialty().into();
        let err = game
            .execute(&mut persister, &invest(Role::Curator, specialty, 1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientTimeBlocks { .. }));
        game.execute(&mut persister, &invest(Role::Curator, Investment::Legacy, 1), 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn out_of_commission_limits_next_round_budget() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let mut game = Game::create(
            &mut persister,
            config(&["OutOfCommissionPioneer"], 3),
            builtin(),
            Some(8),
        )
        .await
        .unwrap();
        play_round(&mut game, &mut persister).await;

        assert_eq!(game.state().player(Role::Pioneer).time_blocks, 3);
        assert_eq!(game.state().player(Role::Curator).time_blocks, 10);
        let err = game
            .execute(&mut persister, &invest(Role::Pioneer, Investment::Upkeep, 4), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientTimeBlocks { .. }));

        let records = log.records(game.id()).await.unwrap();
        let replayed = GameReplayer::new(game.id(), records, builtin())
            .end_state()
            .unwrap();
        assert_eq!(replayed.player(Role::Pioneer).time_blocks, 3);
    }

    #[tokio::test]
    async fn defeat_is_appended_when_health_collapses() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let mut cfg = config(&["CropFailure"], 5);
        cfg.initial_system_health = 20;
        let mut game = Game::create(&mut persister, cfg, builtin(), Some(3))
            .await
            .unwrap();

        game.advance_phase(&mut persister, 0).await.unwrap();
        let events = game.advance_phase(&mut persister, 0).await.unwrap();
        assert_eq!(
            events.iter().map(GameEvent::event_type).collect::<Vec<_>>(),
            vec!["finalizedMarsEvent", "enteredDefeatPhase"]
        );
        assert_eq!(game.state().phase(), Phase::Defeat);

        let err = game.advance_phase(&mut persister, 0).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidPhaseTransition { .. }));
        let err = game
            .execute(&mut persister, &invest(Role::Curator, Investment::Upkeep, 1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidPhaseTransition { .. }));
    }

    #[tokio::test]
    async fn resume_continues_from_the_log() {
        let log = MemoryEventLog::new();
        let mut persister = Persister::new(log.clone());
        let mut game = Game::create(&mut persister, config(&["Audit"], 3), builtin(), Some(5))
            .await
            .unwrap();
        game.execute(&mut persister, &invest(Role::Researcher, Investment::Science, 2), 0)
            .await
            .unwrap();

        let records = log.records(game.id()).await.unwrap();
        let resumed = Game::resume(game.id(), records, builtin(), Some(5)).unwrap();
        assert_eq!(resumed.state().player(Role::Researcher).time_blocks, 6);
        assert_eq!(resumed.state().phase(), Phase::Invest);
    }
}
