//! The game state aggregate: one authoritative in-memory model per game.
//!
//! Every mutation goes through a method on [`GameState`] so that the health
//! clamps and the append-only log cannot be bypassed. The aggregate knows
//! nothing about commands or durability: the live session and the replayer
//! both drive it through [`crate::game_event::GameEvent::apply`].

use std::collections::BTreeMap;

use mars_types::{MarsLogCategory, MarsLogMessage, Phase, Role};
use serde::Serialize;

use crate::config::GameConfig;
use crate::marsevents::MarsEvent;
use crate::marsevents::modifiers::CostChange;
use crate::ordering::ActionQueue;
use crate::player::Player;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Exactly one player per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Players {
    /// The Curator.
    #[serde(rename = "Curator")]
    pub curator: Player,
    /// The Entrepreneur.
    #[serde(rename = "Entrepreneur")]
    pub entrepreneur: Player,
    /// The Pioneer.
    #[serde(rename = "Pioneer")]
    pub pioneer: Player,
    /// The Politician.
    #[serde(rename = "Politician")]
    pub politician: Player,
    /// The Researcher.
    #[serde(rename = "Researcher")]
    pub researcher: Player,
}

impl Players {
    /// Fresh players for a new game.
    pub fn new(config: &GameConfig) -> Self {
        let make = |role| {
            Player::new(
                role,
                config.time_blocks_per_round,
                config.accomplishment_hand_size,
            )
        };
        Self {
            curator: make(Role::Curator),
            entrepreneur: make(Role::Entrepreneur),
            pioneer: make(Role::Pioneer),
            politician: make(Role::Politician),
            researcher: make(Role::Researcher),
        }
    }

    /// The player holding `role`.
    pub const fn get(&self, role: Role) -> &Player {
        match role {
            Role::Curator => &self.curator,
            Role::Entrepreneur => &self.entrepreneur,
            Role::Pioneer => &self.pioneer,
            Role::Politician => &self.politician,
            Role::Researcher => &self.researcher,
        }
    }

    /// Mutable access to the player holding `role`.
    pub const fn get_mut(&mut self, role: Role) -> &mut Player {
        match role {
            Role::Curator => &mut self.curator,
            Role::Entrepreneur => &mut self.entrepreneur,
            Role::Pioneer => &mut self.pioneer,
            Role::Politician => &mut self.politician,
            Role::Researcher => &mut self.researcher,
        }
    }

    /// All players in canonical role order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        [
            &self.curator,
            &self.entrepreneur,
            &self.pioneer,
            &self.politician,
            &self.researcher,
        ]
        .into_iter()
    }

    /// All players in canonical role order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        [
            &mut self.curator,
            &mut self.entrepreneur,
            &mut self.pioneer,
            &mut self.politician,
            &mut self.researcher,
        ]
        .into_iter()
    }
}

// ---------------------------------------------------------------------------
// Carried effects
// ---------------------------------------------------------------------------

/// An event outcome that takes hold when the next round's investment phase
/// opens. Events resolve after investing, so budgets and costs they change
/// would otherwise be reset before anyone could spend against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoundEffect {
    /// Rewrite every player's cost table.
    Cost {
        /// The change to apply.
        change: CostChange,
    },
    /// Fix one role's time-block budget.
    SetTimeBlocks {
        /// The affected role.
        role: Role,
        /// The new budget.
        time_blocks: u32,
    },
    /// Add to one role's time-block budget.
    GainTimeBlocks {
        /// The affected role.
        role: Role,
        /// Time blocks added.
        amount: u32,
    },
}

impl RoundEffect {
    fn apply(self, players: &mut Players) {
        match self {
            Self::Cost { change } => {
                for player in players.iter_mut() {
                    change.apply(player);
                }
            }
            Self::SetTimeBlocks { role, time_blocks } => {
                players.get_mut(role).time_blocks = time_blocks;
            }
            Self::GainTimeBlocks { role, amount } => {
                let player = players.get_mut(role);
                player.time_blocks = player.time_blocks.saturating_add(amount);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Complete state of one game.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(skip)]
    config: GameConfig,
    players: Players,
    round: u32,
    max_round: u32,
    phase: Phase,
    system_health: u32,
    upkeep_per_round: u32,
    trading_enabled: bool,
    log: Vec<MarsLogMessage>,
    mars_events: Vec<MarsEvent>,
    active_event: usize,
    #[serde(skip)]
    pending_actions: ActionQueue,
    next_round_effects: Vec<RoundEffect>,
    winners: Vec<Role>,
}

impl GameState {
    /// The state at the start of round one, in the invest phase.
    pub fn new(config: GameConfig) -> Self {
        Self {
            players: Players::new(&config),
            round: 1,
            max_round: config.max_round,
            phase: Phase::Invest,
            system_health: config.initial_system_health,
            upkeep_per_round: config.upkeep_per_round,
            trading_enabled: true,
            log: Vec::new(),
            mars_events: Vec::new(),
            active_event: 0,
            pending_actions: ActionQueue::default(),
            next_round_effects: Vec::new(),
            winners: Vec::new(),
            config,
        }
    }

    /// The rules this game runs under.
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current round, starting at 1.
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// The final round.
    pub const fn max_round(&self) -> u32 {
        self.max_round
    }

    /// Current phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current system health.
    pub const fn system_health(&self) -> u32 {
        self.system_health
    }

    /// Whether players may trade this round.
    pub const fn trading_enabled(&self) -> bool {
        self.trading_enabled
    }

    /// The game log, oldest first.
    pub fn logs(&self) -> &[MarsLogMessage] {
        &self.log
    }

    /// Roles holding the most victory points once the game is won.
    pub fn winners(&self) -> &[Role] {
        &self.winners
    }

    /// All players.
    pub const fn players(&self) -> &Players {
        &self.players
    }

    /// The player holding `role`.
    pub const fn player(&self, role: Role) -> &Player {
        self.players.get(role)
    }

    /// Mutable access to the player holding `role`.
    pub const fn player_mut(&mut self, role: Role) -> &mut Player {
        self.players.get_mut(role)
    }

    /// Mutable access to every player in canonical order.
    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    // -----------------------------------------------------------------------
    // System health
    // -----------------------------------------------------------------------

    /// Raise system health, clamping at the ceiling.
    pub fn increase_system_health(&mut self, amount: u32) {
        self.system_health = self
            .system_health
            .saturating_add(amount)
            .min(self.config.system_health_ceiling);
    }

    /// Lower system health, clamping at the floor.
    pub fn decrease_system_health(&mut self, amount: u32) {
        self.system_health = self
            .system_health
            .saturating_sub(amount)
            .max(self.config.system_health_floor);
    }

    /// Whether system health has collapsed.
    pub const fn at_health_floor(&self) -> bool {
        self.system_health <= self.config.system_health_floor
    }

    /// Whether the game should now be lost: health at the floor and no
    /// terminal phase entered yet.
    pub const fn should_enter_defeat(&self) -> bool {
        !self.phase.is_terminal() && self.at_health_floor()
    }

    // -----------------------------------------------------------------------
    // Round-scoped switches
    // -----------------------------------------------------------------------

    /// Disable trading until the next round begins.
    pub const fn disable_trading(&mut self) {
        self.trading_enabled = false;
    }

    /// Effects waiting for the next round, in the order they were recorded.
    pub fn next_round_effects(&self) -> &[RoundEffect] {
        &self.next_round_effects
    }

    /// Record an effect to apply once the next round's budgets are reset.
    pub fn carry_over(&mut self, effect: RoundEffect) {
        self.next_round_effects.push(effect);
    }

    // -----------------------------------------------------------------------
    // Log
    // -----------------------------------------------------------------------

    /// Append a message to the log.
    pub fn log(&mut self, content: impl Into<String>, category: impl Into<String>) {
        let id = u32::try_from(self.log.len()).unwrap_or(u32::MAX);
        self.log.push(MarsLogMessage {
            id,
            round: self.round,
            category: category.into(),
            content: content.into(),
        });
    }

    // -----------------------------------------------------------------------
    // Deferred actions
    // -----------------------------------------------------------------------

    /// The queue of deferred actions awaiting the next flush.
    pub const fn pending_actions(&self) -> &ActionQueue {
        &self.pending_actions
    }

    /// Mutable access to the deferred-action queue, for enqueueing.
    pub const fn pending_actions_mut(&mut self) -> &mut ActionQueue {
        &mut self.pending_actions
    }

    // -----------------------------------------------------------------------
    // Mars events of the current round
    // -----------------------------------------------------------------------

    /// Every Mars event drawn this round, in resolution order.
    pub fn mars_events(&self) -> &[MarsEvent] {
        &self.mars_events
    }

    /// Index of the event currently awaiting responses.
    pub const fn active_event_index(&self) -> usize {
        self.active_event
    }

    /// The event currently awaiting responses, if any remain unfinalized.
    pub fn active_event(&self) -> Option<&MarsEvent> {
        self.mars_events.get(self.active_event)
    }

    /// Mutable access to the event awaiting responses.
    pub fn active_event_mut(&mut self) -> Option<&mut MarsEvent> {
        self.mars_events.get_mut(self.active_event)
    }

    /// Whether every event drawn this round has been finalized.
    pub fn all_events_finalized(&self) -> bool {
        self.active_event >= self.mars_events.len()
    }

    /// Replace this round's events and point at the first.
    pub(crate) fn set_round_events(&mut self, events: Vec<MarsEvent>) {
        self.mars_events = events;
        self.active_event = 0;
    }

    /// Detach the active event so it can mutate the state it belongs to.
    /// Must be paired with [`GameState::restore_active_event`].
    pub(crate) fn take_active_event(&mut self) -> Option<MarsEvent> {
        if self.active_event >= self.mars_events.len() {
            return None;
        }
        Some(self.mars_events.remove(self.active_event))
    }

    /// Put back an event taken with [`GameState::take_active_event`].
    pub(crate) fn restore_active_event(&mut self, event: MarsEvent) {
        let index = self.active_event.min(self.mars_events.len());
        self.mars_events.insert(index, event);
    }

    /// Move on to the next event of the round.
    pub(crate) const fn advance_active_event(&mut self) {
        self.active_event = self.active_event.saturating_add(1);
    }

    // -----------------------------------------------------------------------
    // Phase transitions
    // -----------------------------------------------------------------------

    pub(crate) const fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Commit every player's pending investments: resources into
    /// inventories, upkeep units into system health.
    pub(crate) fn commit_investments(&mut self) -> Result<(), crate::error::GameError> {
        let mut upkeep: u32 = 0;
        for player in self.players.iter_mut() {
            let units = player.commit_investments()?;
            upkeep = upkeep
                .checked_add(units)
                .ok_or_else(|| crate::error::GameError::overflow("committed upkeep"))?;
        }
        if upkeep > 0 {
            self.increase_system_health(upkeep);
            self.log(
                format!("Players invested {upkeep} time blocks in upkeep."),
                MarsLogCategory::Invest.label(),
            );
        }
        Ok(())
    }

    /// Start the next round: apply upkeep wear, reset budgets, costs and
    /// trading, clear last round's events. Carried effects are applied on
    /// top of the reset.
    pub(crate) fn begin_next_round(&mut self) {
        self.round = self.round.saturating_add(1);
        self.trading_enabled = true;
        self.mars_events.clear();
        self.active_event = 0;
        let time_blocks = self.config.time_blocks_per_round;
        let hand_size = self.config.accomplishment_hand_size;
        for player in self.players.iter_mut() {
            player.reset_for_round(time_blocks);
            player.accomplishments.refill(hand_size);
        }
        for effect in core::mem::take(&mut self.next_round_effects) {
            effect.apply(&mut self.players);
        }
        self.phase = Phase::Invest;
        self.log(
            format!("Round {} has begun.", self.round),
            MarsLogCategory::NewRound.label(),
        );
        let upkeep = self.upkeep_per_round;
        self.decrease_system_health(upkeep);
        self.log(
            format!("Upkeep has decreased system health by {upkeep}."),
            MarsLogCategory::SystemHealth.label(),
        );
    }

    /// Victory points per role.
    pub fn scores(&self) -> BTreeMap<Role, u32> {
        self.players
            .iter()
            .map(|p| (p.role, p.victory_points))
            .collect()
    }

    /// Enter victory, recording every role tied for the most points.
    pub(crate) fn enter_victory(&mut self) {
        let best = self.players.iter().map(|p| p.victory_points).max().unwrap_or(0);
        self.winners = self
            .players
            .iter()
            .filter(|p| p.victory_points == best)
            .map(|p| p.role)
            .collect();
        self.phase = Phase::Victory;
        let names: Vec<&str> = self.winners.iter().map(|r| r.as_str()).collect();
        self.log(
            format!(
                "The colony survived {} rounds. Winners: {}.",
                self.max_round,
                names.join(", ")
            ),
            MarsLogCategory::Victory.label(),
        );
    }

    /// Enter defeat.
    pub(crate) fn enter_defeat(&mut self) {
        self.winners.clear();
        self.phase = Phase::Defeat;
        self.log(
            format!(
                "System health has collapsed in round {}. The colony is lost.",
                self.round
            ),
            MarsLogCategory::Defeat.label(),
        );
    }
}
