//! Player command envelope delivered by the session layer.
//!
//! Wire form: `{ "role": "Pioneer", "commandType": "invest", "payload": {...} }`.
//! The game core validates each envelope against the current phase and the
//! sender's role before turning it into game events.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Investment, Resource, Role};
use crate::ids::AccomplishmentId;
use crate::structs::ResourceAmount;

/// A command issued by one player.
///
/// No TypeScript binding: the client builds the flattened wire form from
/// [`Role`] and [`Command`] directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// The role of the player issuing the command.
    pub role: Role,
    /// The command itself.
    #[serde(flatten)]
    pub command: Command,
}

/// The player-issued commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "commandType", content = "payload", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Command {
    /// Spend time blocks on units of a resource or upkeep.
    Invest {
        /// What to invest in.
        investment: Investment,
        /// Number of units to buy.
        units: u32,
    },
    /// Respond to the active Mars event.
    RespondToEvent(EventResponse),
    /// Exchange resources with another player.
    Trade {
        /// The counterparty.
        to: Role,
        /// Resources the sender gives up.
        give: ResourceAmount,
        /// Resources the sender receives.
        take: ResourceAmount,
    },
    /// Buy an accomplishment from the sender's hand.
    PurchaseAccomplishment {
        /// The card to buy.
        id: AccomplishmentId,
    },
    /// Return an accomplishment from the sender's hand to their deck.
    DiscardAccomplishment {
        /// The card to discard.
        id: AccomplishmentId,
    },
}

/// A player's response to the active Mars event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum EventResponse {
    /// Opt in or out of a personal-gain payout.
    PersonalGainVote {
        /// `true` to take the payout.
        vote: bool,
    },
    /// Nominate a role in a plurality vote.
    PhilanthropyVote {
        /// The nominated role.
        candidate: Role,
    },
    /// Choose the influence to receive.
    BondingResource {
        /// The chosen resource.
        resource: Resource,
    },
    /// Choose which inventory units to keep.
    BreakdownSave {
        /// Units to keep.
        saved: ResourceAmount,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_wire_form() {
        let raw = r#"{"role":"Pioneer","commandType":"invest","payload":{"investment":"legacy","units":2}}"#;
        let parsed: Result<CommandEnvelope, _> = serde_json::from_str(raw);
        assert_eq!(
            parsed.ok(),
            Some(CommandEnvelope {
                role: Role::Pioneer,
                command: Command::Invest {
                    investment: Investment::Legacy,
                    units: 2,
                },
            })
        );
    }

    #[test]
    fn event_response_is_kind_tagged() {
        let raw = r#"{"role":"Curator","commandType":"respondToEvent","payload":{"kind":"personalGainVote","vote":false}}"#;
        let parsed: Result<CommandEnvelope, _> = serde_json::from_str(raw);
        assert_eq!(
            parsed.ok().map(|e| e.command),
            Some(Command::RespondToEvent(EventResponse::PersonalGainVote {
                vote: false
            }))
        );
    }
}
