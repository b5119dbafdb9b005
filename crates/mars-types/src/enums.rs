//! Enumeration types for the Port of Mars game core.
//!
//! Roles, resources, phases, log categories, and deferred-action tiers. All
//! of these are closed sets: the game never adds variants at runtime.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// A string did not name any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    /// Which enumeration was being parsed (e.g. `"role"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl core::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// One of the five fixed player identities in a game.
///
/// Declaration order is the canonical iteration order: it decides the order
/// of names in log messages and the scan order of vote tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Keeper of Martian culture.
    Curator,
    /// Trader and financier.
    Entrepreneur,
    /// Explorer building the colony's legacy.
    Pioneer,
    /// Governs the colony.
    Politician,
    /// Scientist.
    Researcher,
}

impl Role {
    /// All roles in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Curator,
        Self::Entrepreneur,
        Self::Pioneer,
        Self::Politician,
        Self::Researcher,
    ];

    /// The resource this role produces most cheaply.
    pub const fn specialty(self) -> Resource {
        match self {
            Self::Curator => Resource::Culture,
            Self::Entrepreneur => Resource::Finance,
            Self::Pioneer => Resource::Legacy,
            Self::Politician => Resource::Government,
            Self::Researcher => Resource::Science,
        }
    }

    /// The two resources this role cannot produce under normal costs.
    pub const fn unproducible(self) -> [Resource; 2] {
        match self {
            Self::Curator | Self::Pioneer => [Resource::Finance, Resource::Government],
            Self::Entrepreneur => [Resource::Legacy, Resource::Science],
            Self::Politician => [Resource::Culture, Resource::Science],
            Self::Researcher => [Resource::Culture, Resource::Finance],
        }
    }

    /// The display name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Curator => "Curator",
            Self::Entrepreneur => "Entrepreneur",
            Self::Pioneer => "Pioneer",
            Self::Politician => "Politician",
            Self::Researcher => "Researcher",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "role",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Resources and investments
// ---------------------------------------------------------------------------

/// A kind of influence a player can hold in their inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Resource {
    /// Cultural influence.
    Culture,
    /// Financial influence.
    Finance,
    /// Governmental influence.
    Government,
    /// Legacy influence.
    Legacy,
    /// Scientific influence.
    Science,
}

impl Resource {
    /// All resources in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Culture,
        Self::Finance,
        Self::Government,
        Self::Legacy,
        Self::Science,
    ];

    /// Lowercase name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Culture => "culture",
            Self::Finance => "finance",
            Self::Government => "government",
            Self::Legacy => "legacy",
            Self::Science => "science",
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a player can spend time blocks on: a resource, or upkeep
/// (time invested directly into system health).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Investment {
    /// Produce culture.
    Culture,
    /// Produce finance.
    Finance,
    /// Produce government.
    Government,
    /// Produce legacy.
    Legacy,
    /// Produce science.
    Science,
    /// Repair system health.
    Upkeep,
}

impl Investment {
    /// The resource produced, or `None` for upkeep.
    pub const fn resource(self) -> Option<Resource> {
        match self {
            Self::Culture => Some(Resource::Culture),
            Self::Finance => Some(Resource::Finance),
            Self::Government => Some(Resource::Government),
            Self::Legacy => Some(Resource::Legacy),
            Self::Science => Some(Resource::Science),
            Self::Upkeep => None,
        }
    }
}

impl From<Resource> for Investment {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Culture => Self::Culture,
            Resource::Finance => Self::Finance,
            Resource::Government => Self::Government,
            Resource::Legacy => Self::Legacy,
            Resource::Science => Self::Science,
        }
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// A named segment of a round, plus the two terminal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Players spend time blocks on resources and upkeep.
    Invest,
    /// Mars events are revealed and resolved.
    Event,
    /// Players exchange resources.
    Trade,
    /// Players purchase and discard accomplishments.
    Discard,
    /// The colony survived every round. Absorbing.
    Victory,
    /// System health collapsed. Absorbing.
    Defeat,
}

impl Phase {
    /// Whether no further transition out of this phase is valid.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Victory | Self::Defeat)
    }

    /// The phase that follows within the regular round cycle.
    ///
    /// `Discard` wraps around to `Invest` (the next round). Terminal phases
    /// have no successor.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Invest => Some(Self::Event),
            Self::Event => Some(Self::Trade),
            Self::Trade => Some(Self::Discard),
            Self::Discard => Some(Self::Invest),
            Self::Victory | Self::Defeat => None,
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Invest => "invest",
            Self::Event => "event",
            Self::Trade => "trade",
            Self::Discard => "discard",
            Self::Victory => "victory",
            Self::Defeat => "defeat",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Log categories
// ---------------------------------------------------------------------------

/// Category tag attached to every message in the game log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum MarsLogCategory {
    /// A Mars event took effect.
    Event,
    /// Investments were committed.
    Invest,
    /// A trade completed.
    Trade,
    /// An accomplishment was purchased.
    Purchase,
    /// An accomplishment was discarded.
    Discard,
    /// A new round began.
    NewRound,
    /// System health changed outside of an event.
    SystemHealth,
    /// The game was won.
    Victory,
    /// The game was lost.
    Defeat,
}

impl MarsLogCategory {
    /// Human-readable label used as the category prefix in the log.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Event => "Mars Event",
            Self::Invest => "Investment",
            Self::Trade => "Trade",
            Self::Purchase => "Purchase",
            Self::Discard => "Discard",
            Self::NewRound => "New Round",
            Self::SystemHealth => "System Health",
            Self::Victory => "Victory",
            Self::Defeat => "Defeat",
        }
    }
}

// ---------------------------------------------------------------------------
// Deferred action tiers
// ---------------------------------------------------------------------------

/// Execution tier of a deferred action. Lower tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ActionOrdering {
    /// Runs before everything else.
    First,
    /// Runs after `First`.
    Middle,
    /// Runs after everything else.
    Last,
}
