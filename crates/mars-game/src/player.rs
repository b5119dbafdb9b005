//! Per-player state: inventory, time blocks, cost table, and accomplishments.
//!
//! All quantity changes use checked arithmetic and fail with a typed
//! [`GameError`] rather than wrapping. Validation methods (`check_*`) never
//! mutate, so the live session can reject a command before any state
//! changes.

use mars_types::{
    Accomplishment, AccomplishmentId, Investment, InvestmentData, Resource, ResourceAmount, Role,
};
use serde::Serialize;

use crate::accomplishment::AccomplishmentSet;
use crate::error::GameError;

/// Time-block cost of an investment the role cannot make.
pub const COST_UNAVAILABLE: u32 = 1000;

/// Cost of a resource that is neither the specialty nor unproducible.
pub const COST_STANDARD: u32 = 3;

/// Cost of the role's specialty resource.
pub const COST_SPECIALTY: u32 = 2;

/// Cost of one unit of upkeep.
pub const COST_UPKEEP: u32 = 1;

/// The base cost table for a role.
pub fn base_costs(role: Role) -> InvestmentData {
    let mut costs = InvestmentData {
        culture: COST_STANDARD,
        finance: COST_STANDARD,
        government: COST_STANDARD,
        legacy: COST_STANDARD,
        science: COST_STANDARD,
        upkeep: COST_UPKEEP,
    };
    *costs.get_mut(role.specialty().into()) = COST_SPECIALTY;
    for resource in role.unproducible() {
        *costs.get_mut(resource.into()) = COST_UNAVAILABLE;
    }
    costs
}

/// One player, bound to a role for the whole game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// The player's role.
    pub role: Role,
    /// Resources held.
    pub inventory: ResourceAmount,
    /// Units bought this round and not yet committed.
    pub pending_investments: InvestmentData,
    /// Time blocks left to spend this round.
    pub time_blocks: u32,
    /// Current time-block cost per unit of each investment.
    pub costs: InvestmentData,
    /// Hand, deck, and purchased accomplishments.
    pub accomplishments: AccomplishmentSet,
    /// Points from purchased accomplishments.
    pub victory_points: u32,
}

impl Player {
    /// A player at the start of a game.
    pub fn new(role: Role, time_blocks: u32, hand_size: usize) -> Self {
        Self {
            role,
            inventory: ResourceAmount::default(),
            pending_investments: InvestmentData::default(),
            time_blocks,
            costs: base_costs(role),
            accomplishments: AccomplishmentSet::new(role, hand_size),
            victory_points: 0,
        }
    }

    /// The role's specialty resource.
    pub const fn specialty(&self) -> Resource {
        self.role.specialty()
    }

    /// Restore the round budget and base costs at a round boundary.
    pub fn reset_for_round(&mut self, time_blocks: u32) {
        self.time_blocks = time_blocks;
        self.costs = base_costs(self.role);
    }

    /// Time blocks that buying `units` of `investment` would cost.
    ///
    /// # Errors
    ///
    /// [`GameError::InsufficientTimeBlocks`] if the player cannot pay.
    pub fn check_invest(&self, investment: Investment, units: u32) -> Result<u32, GameError> {
        let required = self
            .costs
            .get(investment)
            .checked_mul(units)
            .ok_or_else(|| GameError::overflow("investment cost"))?;
        if required > self.time_blocks {
            return Err(GameError::InsufficientTimeBlocks {
                role: self.role,
                required,
                available: self.time_blocks,
            });
        }
        Ok(required)
    }

    /// Spend time blocks on `units` of `investment`, buffering the units
    /// until the investment phase ends.
    ///
    /// # Errors
    ///
    /// [`GameError::InsufficientTimeBlocks`] if the player cannot pay.
    pub fn invest(&mut self, investment: Investment, units: u32) -> Result<(), GameError> {
        let required = self.check_invest(investment, units)?;
        let slot = self.pending_investments.get_mut(investment);
        *slot = slot
            .checked_add(units)
            .ok_or_else(|| GameError::overflow("pending investment"))?;
        self.time_blocks = self.time_blocks.saturating_sub(required);
        Ok(())
    }

    /// Move buffered resource units into the inventory and clear the
    /// buffer. Returns the buffered upkeep units, which the caller adds to
    /// system health.
    ///
    /// # Errors
    ///
    /// [`GameError::ArithmeticOverflow`] if the inventory would overflow.
    pub fn commit_investments(&mut self) -> Result<u32, GameError> {
        let pending = core::mem::take(&mut self.pending_investments);
        self.inventory = self
            .inventory
            .checked_add(&pending.resources())
            .ok_or_else(|| GameError::overflow("inventory on commit"))?;
        Ok(pending.upkeep)
    }

    /// Add resources to the inventory.
    ///
    /// # Errors
    ///
    /// [`GameError::ArithmeticOverflow`] on overflow.
    pub fn gain(&mut self, amount: &ResourceAmount) -> Result<(), GameError> {
        self.inventory = self
            .inventory
            .checked_add(amount)
            .ok_or_else(|| GameError::overflow("inventory gain"))?;
        Ok(())
    }

    /// Remove resources from the inventory.
    ///
    /// # Errors
    ///
    /// [`GameError::InsufficientResources`] if the player does not hold them.
    pub fn spend(&mut self, amount: &ResourceAmount, operation: &str) -> Result<(), GameError> {
        self.inventory = self.inventory.checked_sub(amount).ok_or_else(|| {
            GameError::InsufficientResources {
                role: self.role,
                operation: operation.to_owned(),
            }
        })?;
        Ok(())
    }

    /// The active accomplishment `id`, if the player could buy it now.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownAccomplishment`] if the card is not in the hand,
    /// or [`GameError::InsufficientResources`] if the player cannot pay.
    pub fn check_purchase(&self, id: AccomplishmentId) -> Result<&Accomplishment, GameError> {
        let card = self.check_active(id)?;
        if !self.inventory.covers(&card.cost) {
            return Err(GameError::InsufficientResources {
                role: self.role,
                operation: format!("purchase {}", card.label),
            });
        }
        Ok(card)
    }

    /// The active accomplishment `id`.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownAccomplishment`] if the card is not in the hand.
    pub fn check_active(&self, id: AccomplishmentId) -> Result<&Accomplishment, GameError> {
        self.accomplishments
            .find_active(id)
            .ok_or(GameError::UnknownAccomplishment {
                role: self.role,
                id,
            })
    }

    /// Buy an active accomplishment: pay its cost, score its points, and
    /// refill the hand.
    ///
    /// # Errors
    ///
    /// As [`Player::check_purchase`].
    pub fn purchase(
        &mut self,
        id: AccomplishmentId,
        hand_size: usize,
    ) -> Result<Accomplishment, GameError> {
        let cost = self.check_purchase(id)?.cost;
        let card = self
            .accomplishments
            .purchase(id)
            .ok_or(GameError::UnknownAccomplishment {
                role: self.role,
                id,
            })?;
        self.spend(&cost, "purchase")?;
        self.victory_points = self
            .victory_points
            .checked_add(card.victory_points)
            .ok_or_else(|| GameError::overflow("victory points"))?;
        self.accomplishments.refill(hand_size);
        Ok(card)
    }

    /// Return an active accomplishment to the deck and refill the hand.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownAccomplishment`] if the card is not in the hand.
    pub fn discard(
        &mut self,
        id: AccomplishmentId,
        hand_size: usize,
    ) -> Result<Accomplishment, GameError> {
        let card = self
            .accomplishments
            .discard(id)
            .ok_or(GameError::UnknownAccomplishment {
                role: self.role,
                id,
            })?;
        self.accomplishments.refill(hand_size);
        Ok(card)
    }

    /// Give up the most recent purchase and the points it scored.
    pub fn lose_last_purchase(&mut self) -> Option<Accomplishment> {
        let card = self.accomplishments.remove_last_purchased()?;
        self.victory_points = self.victory_points.saturating_sub(card.victory_points);
        Some(card)
    }
}
