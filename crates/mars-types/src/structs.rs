//! Core value structs shared between the game core, the event log, and the
//! client: resource bundles, cost tables, log messages, accomplishment
//! cards, and the serialized forms of Mars events and game event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Investment, Resource, Role};
use crate::ids::{AccomplishmentId, GameEventId, GameId};

// ---------------------------------------------------------------------------
// Resource bundles
// ---------------------------------------------------------------------------

/// A quantity of each resource. Used for inventories, trade offers, and
/// accomplishment costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceAmount {
    /// Units of culture.
    #[serde(default)]
    pub culture: u32,
    /// Units of finance.
    #[serde(default)]
    pub finance: u32,
    /// Units of government.
    #[serde(default)]
    pub government: u32,
    /// Units of legacy.
    #[serde(default)]
    pub legacy: u32,
    /// Units of science.
    #[serde(default)]
    pub science: u32,
}

impl ResourceAmount {
    /// A bundle holding `amount` of a single resource.
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut bundle = Self::default();
        *bundle.get_mut(resource) = amount;
        bundle
    }

    /// Quantity of the given resource.
    pub const fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Culture => self.culture,
            Resource::Finance => self.finance,
            Resource::Government => self.government,
            Resource::Legacy => self.legacy,
            Resource::Science => self.science,
        }
    }

    /// Mutable access to the quantity of the given resource.
    pub const fn get_mut(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Culture => &mut self.culture,
            Resource::Finance => &mut self.finance,
            Resource::Government => &mut self.government,
            Resource::Legacy => &mut self.legacy,
            Resource::Science => &mut self.science,
        }
    }

    /// Iterate `(resource, quantity)` pairs in canonical resource order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::ALL.into_iter().map(|r| (r, self.get(r)))
    }

    /// Sum of all quantities. Returns `None` on overflow.
    pub fn total(&self) -> Option<u32> {
        self.iter().try_fold(0_u32, |acc, (_, qty)| acc.checked_add(qty))
    }

    /// Whether every quantity is zero.
    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, qty)| qty == 0)
    }

    /// Whether this bundle holds at least `other` of every resource.
    pub fn covers(&self, other: &Self) -> bool {
        self.iter().all(|(r, qty)| qty >= other.get(r))
    }

    /// Element-wise sum. Returns `None` on overflow.
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let mut out = *self;
        for (r, qty) in other.iter() {
            let slot = out.get_mut(r);
            *slot = slot.checked_add(qty)?;
        }
        Some(out)
    }

    /// Element-wise difference. Returns `None` if any quantity would go
    /// negative.
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        let mut out = *self;
        for (r, qty) in other.iter() {
            let slot = out.get_mut(r);
            *slot = slot.checked_sub(qty)?;
        }
        Some(out)
    }
}

/// A value per [`Investment`]: five resources plus upkeep.
///
/// Serves both as a per-player cost table (time blocks per unit) and as the
/// pending-investment buffer (units bought this round, not yet committed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InvestmentData {
    /// Value for culture.
    #[serde(default)]
    pub culture: u32,
    /// Value for finance.
    #[serde(default)]
    pub finance: u32,
    /// Value for government.
    #[serde(default)]
    pub government: u32,
    /// Value for legacy.
    #[serde(default)]
    pub legacy: u32,
    /// Value for science.
    #[serde(default)]
    pub science: u32,
    /// Value for upkeep (system health).
    #[serde(default)]
    pub upkeep: u32,
}

impl InvestmentData {
    /// Value for the given investment.
    pub const fn get(&self, investment: Investment) -> u32 {
        match investment {
            Investment::Culture => self.culture,
            Investment::Finance => self.finance,
            Investment::Government => self.government,
            Investment::Legacy => self.legacy,
            Investment::Science => self.science,
            Investment::Upkeep => self.upkeep,
        }
    }

    /// Mutable access to the value for the given investment.
    pub const fn get_mut(&mut self, investment: Investment) -> &mut u32 {
        match investment {
            Investment::Culture => &mut self.culture,
            Investment::Finance => &mut self.finance,
            Investment::Government => &mut self.government,
            Investment::Legacy => &mut self.legacy,
            Investment::Science => &mut self.science,
            Investment::Upkeep => &mut self.upkeep,
        }
    }

    /// The resource portion, dropping upkeep.
    pub const fn resources(&self) -> ResourceAmount {
        ResourceAmount {
            culture: self.culture,
            finance: self.finance,
            government: self.government,
            legacy: self.legacy,
            science: self.science,
        }
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// One entry in the game's visible log.
///
/// Entries carry no wall-clock time so that replaying a log reproduces them
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MarsLogMessage {
    /// Zero-based position in the log. Display order.
    pub id: u32,
    /// The round during which the entry was written.
    pub round: u32,
    /// Category tag, e.g. `"Mars Event: Sandstorm"`.
    pub category: String,
    /// Human-readable text.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Accomplishments
// ---------------------------------------------------------------------------

/// An accomplishment card a player can purchase for victory points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Accomplishment {
    /// Card identifier, unique across all roles.
    pub id: AccomplishmentId,
    /// The role whose deck holds this card.
    pub role: Role,
    /// Card title.
    pub label: String,
    /// Points awarded on purchase.
    pub victory_points: u32,
    /// Resources spent on purchase.
    pub cost: ResourceAmount,
}

// ---------------------------------------------------------------------------
// Serialized forms
// ---------------------------------------------------------------------------

/// Wire and log form of a Mars event: the registered type identifier plus
/// any behavior-specific mutable data.
///
/// Absence of `data` means the behavior is stateless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MarsEventSerialized {
    /// Registered type identifier, e.g. `"PersonalGain"`.
    pub id: String,
    /// Behavior-specific data (votes, assignments, orders).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub data: Option<serde_json::Value>,
}

impl MarsEventSerialized {
    /// A stateless event reference.
    pub fn stateless(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            data: None,
        }
    }
}

/// The durable unit of the event log.
///
/// Immutable once appended. Replay reads records for one game ordered by
/// ascending `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct GameEventRecord {
    /// Durable sequence number.
    pub id: GameEventId,
    /// Event type tag, e.g. `"finalizedMarsEvent"`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Type-specific JSON payload.
    pub payload: serde_json::Value,
    /// Owning game.
    pub game_id: GameId,
    /// When the record was appended.
    pub date_created: DateTime<Utc>,
}

/// Metadata attached to every persisted batch of game events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PersistMetadata {
    /// Owning game.
    pub game_id: GameId,
    /// When the batch was produced.
    pub date_created: DateTime<Utc>,
    /// Seconds left on the phase timer when the batch was produced.
    pub time_remaining: u32,
}
