//! Events resolved from player responses: votes and per-player choices.
//!
//! Each behavior keeps its responses in a small serde struct so that the
//! persisted form (`MarsEventSerialized::data`) is exactly what the
//! behavior needs to be rebuilt. Roles that never respond fall back to a
//! per-event default.

use std::collections::BTreeMap;

use mars_types::{ActionOrdering, EventResponse, Resource, ResourceAmount, Role};
use rand::RngCore;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{
    Capabilities, MarsEventBehavior, decode_data, encode_data, event_category, wrong_response,
};
use crate::error::GameError;
use crate::ordering::DeferredAction;
use crate::state::GameState;

/// Time blocks each yes voter gains from Personal Gain, and the system
/// health lost per yes vote.
pub const PERSONAL_GAIN_AMOUNT: u32 = 6;

/// Time blocks every player keeps during a Breakdown of Trust.
pub const BREAKDOWN_TIME_BLOCKS: u32 = 2;

/// Inventory units a player may save from a Breakdown of Trust.
pub const BREAKDOWN_SAVE_LIMIT: u32 = 2;

// ---------------------------------------------------------------------------
// Personal Gain
// ---------------------------------------------------------------------------

/// Binary vote: each yes voter gains time blocks at the colony's expense.
/// Unrecorded votes count as yes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonalGain {
    votes: BTreeMap<Role, bool>,
}

impl PersonalGain {
    /// Roles voting yes, canonical order.
    pub fn yes_voters(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.votes.get(role).copied().unwrap_or(true))
            .collect()
    }

    /// Build from constructor data.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if the data is not a role to bool map.
    pub fn factory(
        data: Option<serde_json::Value>,
        _rng: &mut dyn RngCore,
    ) -> Result<Box<dyn MarsEventBehavior>, GameError> {
        let event: Self = decode_data("PersonalGain", data)?;
        Ok(Box::new(event))
    }
}

impl MarsEventBehavior for PersonalGain {
    fn id(&self) -> &'static str {
        "PersonalGain"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RESPOND
    }

    fn respond(&mut self, role: Role, response: &EventResponse) -> Result<(), GameError> {
        let EventResponse::PersonalGainVote { vote } = response else {
            return Err(wrong_response(self.id(), response));
        };
        self.votes.insert(role, *vote);
        Ok(())
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        state.pending_actions_mut().enqueue(
            ActionOrdering::First,
            DeferredAction::PersonalGainPayout {
                yes_voters: self.yes_voters(),
                amount: PERSONAL_GAIN_AMOUNT,
                category: event_category(self.id()),
            },
        );
        Ok(())
    }

    fn data(&self) -> Result<Option<serde_json::Value>, GameError> {
        encode_data(self.id(), self)
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Compulsive Philanthropy
// ---------------------------------------------------------------------------

/// Plurality vote: the winner donates every remaining time block to system
/// health.
///
/// Each role defaults to voting for itself. Ties go to the tied role that
/// comes first in `order`, a shuffled permutation fixed when the event is
/// drawn and persisted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompulsivePhilanthropy {
    #[serde(default)]
    votes: BTreeMap<Role, Role>,
    order: Vec<Role>,
}

impl CompulsivePhilanthropy {
    /// An event with a caller-chosen tie-break order.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if `order` is not a permutation of
    /// the five roles.
    pub fn with_order(order: Vec<Role>) -> Result<Self, GameError> {
        let event = Self {
            votes: BTreeMap::new(),
            order,
        };
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<(), GameError> {
        let mut sorted = self.order.clone();
        sorted.sort_unstable();
        if sorted != Role::ALL {
            return Err(GameError::malformed(
                "CompulsivePhilanthropy",
                "order must list each role exactly once",
            ));
        }
        Ok(())
    }

    /// The nominee of `role`.
    fn vote_of(&self, role: Role) -> Role {
        self.votes.get(&role).copied().unwrap_or(role)
    }

    /// The winning role and its vote count.
    pub fn winner(&self) -> (Role, u32) {
        let mut tally: BTreeMap<Role, u32> = BTreeMap::new();
        for role in Role::ALL {
            let count = tally.entry(self.vote_of(role)).or_insert(0);
            *count = count.saturating_add(1);
        }
        let mut best: Option<(Role, u32)> = None;
        for &role in &self.order {
            let count = tally.get(&role).copied().unwrap_or(0);
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((role, count));
            }
        }
        best.unwrap_or((Role::Curator, 0))
    }

    /// Build from constructor data, shuffling a fresh order when none is
    /// given.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if the data does not decode or its
    /// order is not a permutation of the roles.
    pub fn factory(
        data: Option<serde_json::Value>,
        rng: &mut dyn RngCore,
    ) -> Result<Box<dyn MarsEventBehavior>, GameError> {
        let event = match data {
            None | Some(serde_json::Value::Null) => {
                let mut order = Role::ALL.to_vec();
                order.shuffle(rng);
                Self {
                    votes: BTreeMap::new(),
                    order,
                }
            }
            data @ Some(_) => {
                let event: Self = decode_data("CompulsivePhilanthropy", data)?;
                event.validate()?;
                event
            }
        };
        Ok(Box::new(event))
    }
}

impl Default for CompulsivePhilanthropy {
    fn default() -> Self {
        Self {
            votes: BTreeMap::new(),
            order: Role::ALL.to_vec(),
        }
    }
}

impl MarsEventBehavior for CompulsivePhilanthropy {
    fn id(&self) -> &'static str {
        "CompulsivePhilanthropy"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RESPOND
    }

    fn respond(&mut self, role: Role, response: &EventResponse) -> Result<(), GameError> {
        let EventResponse::PhilanthropyVote { candidate } = response else {
            return Err(wrong_response(self.id(), response));
        };
        self.votes.insert(role, *candidate);
        Ok(())
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        let (winner, count) = self.winner();
        state.log(
            format!(
                "The {winner} was voted to be Compulsive Philanthropist with {count} votes. \
                 The {winner} invested all of their timeblocks into System Health."
            ),
            event_category(self.id()),
        );
        state.pending_actions_mut().enqueue(
            ActionOrdering::Last,
            DeferredAction::DonateTimeBlocks { role: winner },
        );
        Ok(())
    }

    fn data(&self) -> Result<Option<serde_json::Value>, GameError> {
        encode_data(self.id(), self)
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Bonding Through Adversity
// ---------------------------------------------------------------------------

/// Every player gains one unit of an influence of their choice, defaulting
/// to their specialty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BondingThroughAdversity {
    choices: BTreeMap<Role, Resource>,
}

impl BondingThroughAdversity {
    /// Build from constructor data.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if the data is not a role to
    /// resource map.
    pub fn factory(
        data: Option<serde_json::Value>,
        _rng: &mut dyn RngCore,
    ) -> Result<Box<dyn MarsEventBehavior>, GameError> {
        let event: Self = decode_data("BondingThroughAdversity", data)?;
        Ok(Box::new(event))
    }
}

impl MarsEventBehavior for BondingThroughAdversity {
    fn id(&self) -> &'static str {
        "BondingThroughAdversity"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RESPOND
    }

    fn respond(&mut self, role: Role, response: &EventResponse) -> Result<(), GameError> {
        let EventResponse::BondingResource { resource } = response else {
            return Err(wrong_response(self.id(), response));
        };
        self.choices.insert(role, *resource);
        Ok(())
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        for role in Role::ALL {
            let resource = self
                .choices
                .get(&role)
                .copied()
                .unwrap_or_else(|| role.specialty());
            state
                .player_mut(role)
                .gain(&ResourceAmount::single(resource, 1))?;
        }
        state.log(
            "Each player gained one unit of the influence they chose.",
            event_category(self.id()),
        );
        Ok(())
    }

    fn data(&self) -> Result<Option<serde_json::Value>, GameError> {
        encode_data(self.id(), self)
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Breakdown of Trust
// ---------------------------------------------------------------------------

/// Every inventory is put at risk. Players choose up to two units to save;
/// the rest is lost. Time blocks drop to two while the event is open and
/// are restored when it resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownOfTrust {
    #[serde(default)]
    saved_time_blocks: BTreeMap<Role, u32>,
    #[serde(default)]
    saved: BTreeMap<Role, ResourceAmount>,
}

impl BreakdownOfTrust {
    /// Build from constructor data.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if the data does not decode.
    pub fn factory(
        data: Option<serde_json::Value>,
        _rng: &mut dyn RngCore,
    ) -> Result<Box<dyn MarsEventBehavior>, GameError> {
        let event: Self = decode_data("BreakdownOfTrust", data)?;
        Ok(Box::new(event))
    }
}

/// The part of `wanted` covered by `at_risk`, capped at `limit` units in
/// canonical resource order.
fn clamp_saved(wanted: &ResourceAmount, at_risk: &ResourceAmount, limit: u32) -> ResourceAmount {
    let mut kept = ResourceAmount::default();
    let mut remaining = limit;
    for (resource, qty) in wanted.iter() {
        let take = qty.min(at_risk.get(resource)).min(remaining);
        *kept.get_mut(resource) = take;
        remaining = remaining.saturating_sub(take);
    }
    kept
}

impl MarsEventBehavior for BreakdownOfTrust {
    fn id(&self) -> &'static str {
        "BreakdownOfTrust"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INITIALIZE_AND_RESPOND
    }

    fn initialize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        for player in state.players_mut() {
            self.saved_time_blocks.insert(player.role, player.time_blocks);
            player.time_blocks = BREAKDOWN_TIME_BLOCKS;
            let inventory = core::mem::take(&mut player.inventory);
            for (resource, qty) in inventory.iter() {
                let slot = player.pending_investments.get_mut(resource.into());
                *slot = slot
                    .checked_add(qty)
                    .ok_or_else(|| GameError::overflow("inventory at risk"))?;
            }
        }
        Ok(())
    }

    fn respond(&mut self, role: Role, response: &EventResponse) -> Result<(), GameError> {
        let EventResponse::BreakdownSave { saved } = response else {
            return Err(wrong_response(self.id(), response));
        };
        let total = saved
            .total()
            .ok_or_else(|| GameError::overflow("saved influence"))?;
        if total > BREAKDOWN_SAVE_LIMIT {
            return Err(GameError::InvalidResponse {
                id: self.id().to_owned(),
                reason: format!("at most {BREAKDOWN_SAVE_LIMIT} units can be saved, got {total}"),
            });
        }
        self.saved.insert(role, *saved);
        Ok(())
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        for player in state.players_mut() {
            let pending = core::mem::take(&mut player.pending_investments);
            let wanted = self.saved.get(&player.role).copied().unwrap_or_default();
            let kept = clamp_saved(&wanted, &pending.resources(), BREAKDOWN_SAVE_LIMIT);
            player.gain(&kept)?;
            player.pending_investments.upkeep = pending.upkeep;
            if let Some(time_blocks) = self.saved_time_blocks.get(&player.role) {
                player.time_blocks = *time_blocks;
            }
        }
        state.log(
            "Trust has broken down. Players kept only the influence they chose to save.",
            event_category(self.id()),
        );
        Ok(())
    }

    fn data(&self) -> Result<Option<serde_json::Value>, GameError> {
        encode_data(self.id(), self)
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(self.clone())
    }
}
