//! Events that change the rules of play: investment costs, time-block
//! budgets, and accomplishment hands.
//!
//! Cost and budget changes land on the next investment phase through
//! [`RoundEffect`]. Hand changes happen at once.

use mars_types::{ActionOrdering, Investment, Role};
use rand::RngCore;
use serde::Serialize;

use super::{MarsEventBehavior, event_category};
use crate::error::GameError;
use crate::ordering::DeferredAction;
use crate::player::{COST_STANDARD, COST_UNAVAILABLE, Player};
use crate::state::{GameState, RoundEffect};

/// Time blocks left to a player who is out of commission.
pub const OUT_OF_COMMISSION_TIME_BLOCKS: u32 = 3;

// ---------------------------------------------------------------------------
// Cost modifiers
// ---------------------------------------------------------------------------

/// Which cost change a [`CostModifier`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CostChange {
    /// Specialty resources become unavailable.
    Stymied,
    /// Upkeep costs twice as much.
    DifficultConditions,
    /// Unproducible resources cost the standard price.
    Interdisciplinary,
}

impl CostChange {
    /// Rewrite one player's cost table.
    pub fn apply(self, player: &mut Player) {
        match self {
            Self::Stymied => {
                *player.costs.get_mut(player.role.specialty().into()) = COST_UNAVAILABLE;
            }
            Self::DifficultConditions => {
                let upkeep = player.costs.get_mut(Investment::Upkeep);
                *upkeep = upkeep.saturating_mul(2);
            }
            Self::Interdisciplinary => {
                for resource in player.role.unproducible() {
                    *player.costs.get_mut(resource.into()) = COST_STANDARD;
                }
            }
        }
    }
}

/// An event that rewrites every player's cost table for the next
/// investment phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModifier {
    change: CostChange,
}

impl CostModifier {
    /// A modifier applying `change`.
    pub const fn new(change: CostChange) -> Self {
        Self { change }
    }
}

impl MarsEventBehavior for CostModifier {
    fn id(&self) -> &'static str {
        match self.change {
            CostChange::Stymied => "Stymied",
            CostChange::DifficultConditions => "DifficultConditions",
            CostChange::Interdisciplinary => "Interdisciplinary",
        }
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        state.carry_over(RoundEffect::Cost {
            change: self.change,
        });
        let message = match self.change {
            CostChange::Stymied => "Players may not earn their specialty Influence this round.",
            CostChange::DifficultConditions => "Upkeep costs twice as many time blocks this round.",
            CostChange::Interdisciplinary => {
                "In this round, each player can spend 3 time blocks to earn an influence in \
                 either of the 2 influences they normally can't create."
            }
        };
        state.log(message, event_category(self.id()));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(*self)
    }
}

// ---------------------------------------------------------------------------
// Accomplishment modifiers
// ---------------------------------------------------------------------------

/// Every player who has purchased an accomplishment loses the most recent
/// one and its victory points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffortsWasted;

impl MarsEventBehavior for EffortsWasted {
    fn id(&self) -> &'static str {
        "EffortsWasted"
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        let affected: Vec<&str> = state
            .players_mut()
            .filter_map(|player| player.lose_last_purchase().map(|_| player.role.as_str()))
            .collect();
        let message = if affected.is_empty() {
            "No accomplishments were lost.".to_owned()
        } else {
            format!(
                "The following players lost their most recent accomplishment: {}",
                affected.join(", ")
            )
        };
        state.log(message, event_category(self.id()));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(*self)
    }
}

/// Every player returns their hand to the deck and draws a single card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangingTides;

impl MarsEventBehavior for ChangingTides {
    fn id(&self) -> &'static str {
        "ChangingTides"
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        for player in state.players_mut() {
            player.accomplishments.discard_all();
            player.accomplishments.refill(1);
        }
        state.log(
            "Each player discards their current Accomplishments and draws one new Accomplishment.",
            event_category(self.id()),
        );
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(*self)
    }
}

// ---------------------------------------------------------------------------
// Out of commission
// ---------------------------------------------------------------------------

/// One role is left with a reduced time-block budget for the next
/// investment phase.
///
/// The target is fixed by the registered variant; constructor data cannot
/// redirect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfCommission {
    target: Role,
}

impl OutOfCommission {
    /// The variant targeting `target`.
    pub const fn new(target: Role) -> Self {
        Self { target }
    }

    /// The role put out of commission.
    pub const fn target(&self) -> Role {
        self.target
    }
}

impl MarsEventBehavior for OutOfCommission {
    fn id(&self) -> &'static str {
        match self.target {
            Role::Curator => "OutOfCommissionCurator",
            Role::Entrepreneur => "OutOfCommissionEntrepreneur",
            Role::Pioneer => "OutOfCommissionPioneer",
            Role::Politician => "OutOfCommissionPolitician",
            Role::Researcher => "OutOfCommissionResearcher",
        }
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        state.pending_actions_mut().enqueue(
            ActionOrdering::Middle,
            DeferredAction::SetTimeBlocks {
                role: self.target,
                time_blocks: OUT_OF_COMMISSION_TIME_BLOCKS,
                category: event_category("OutOfCommission"),
            },
        );
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(*self)
    }
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

macro_rules! fixed_factory {
    ($name:ident, $value:expr) => {
        /// Construct this event. Constructor data is ignored.
        ///
        /// # Errors
        ///
        /// Never fails.
        pub fn $name(
            _data: Option<serde_json::Value>,
            _rng: &mut dyn RngCore,
        ) -> Result<Box<dyn MarsEventBehavior>, GameError> {
            Ok(Box::new($value))
        }
    };
}

fixed_factory!(stymied, CostModifier::new(CostChange::Stymied));
fixed_factory!(difficult_conditions, CostModifier::new(CostChange::DifficultConditions));
fixed_factory!(interdisciplinary, CostModifier::new(CostChange::Interdisciplinary));
fixed_factory!(efforts_wasted, EffortsWasted);
fixed_factory!(changing_tides, ChangingTides);
fixed_factory!(out_of_commission_curator, OutOfCommission::new(Role::Curator));
fixed_factory!(out_of_commission_entrepreneur, OutOfCommission::new(Role::Entrepreneur));
fixed_factory!(out_of_commission_pioneer, OutOfCommission::new(Role::Pioneer));
fixed_factory!(out_of_commission_politician, OutOfCommission::new(Role::Politician));
fixed_factory!(out_of_commission_researcher, OutOfCommission::new(Role::Researcher));

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mars_types::{AccomplishmentId, ResourceAmount};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::GameConfig;
    use crate::marsevents::MarsEvent;
    use crate::ordering::flush;

    fn state() -> GameState {
        GameState::new(GameConfig::default())
    }

    #[test]
    fn pioneer_variant_ignores_constructor_data() {
        let mut rng = SmallRng::seed_from_u64(1);
        let data = serde_json::json!({ "roles": { "Pioneer": "Curator" } });
        let behavior = out_of_commission_pioneer(Some(data), &mut rng).unwrap();
        assert_eq!(behavior.id(), "OutOfCommissionPioneer");

        let mut state = state();
        let mut event = MarsEvent::new(behavior);
        event.finalize(&mut state).unwrap();
        assert_eq!(state.pending_actions().len(), 1);
        flush(&mut state);

        assert_eq!(state.player(Role::Pioneer).time_blocks, 10);
        assert_eq!(
            state.next_round_effects(),
            &[RoundEffect::SetTimeBlocks {
                role: Role::Pioneer,
                time_blocks: 3
            }]
        );
        let entry = state.logs().first().unwrap();
        assert_eq!(entry.category, "Mars Event: Out Of Commission");
        assert_eq!(entry.content, "Pioneer has 3 time blocks to invest during this round.");

        state.begin_next_round();
        assert_eq!(state.player(Role::Pioneer).time_blocks, 3);
        assert_eq!(state.player(Role::Curator).time_blocks, 10);
    }

    #[test]
    fn stymied_blocks_specialty_in_the_next_invest_phase() {
        let mut state = state();
        MarsEvent::new(Box::new(CostModifier::new(CostChange::Stymied)))
            .finalize(&mut state)
            .unwrap();
        assert_eq!(
            state.logs().first().map(|m| m.content.as_str()),
            Some("Players may not earn their specialty Influence this round.")
        );
        state.begin_next_round();

        let researcher = state.player_mut(Role::Researcher);
        assert_eq!(researcher.costs.science, COST_UNAVAILABLE);
        assert_eq!(researcher.costs.legacy, 3);
        let err = researcher.invest(Investment::Science, 1).unwrap_err();
        assert!(matches!(err, GameError::InsufficientTimeBlocks { .. }));
    }

    #[test]
    fn difficult_conditions_doubles_upkeep() {
        let mut state = state();
        MarsEvent::new(Box::new(CostModifier::new(CostChange::DifficultConditions)))
            .finalize(&mut state)
            .unwrap();
        state.begin_next_round();
        for player in state.players().iter() {
            assert_eq!(player.costs.upkeep, 2);
        }
    }

    #[test]
    fn interdisciplinary_opens_unproducible_resources() {
        let mut state = state();
        MarsEvent::new(Box::new(CostModifier::new(CostChange::Interdisciplinary)))
            .finalize(&mut state)
            .unwrap();
        assert_eq!(state.player(Role::Curator).costs.finance, COST_UNAVAILABLE);
        state.begin_next_round();
        let curator = state.player(Role::Curator);
        assert_eq!(curator.costs.finance, COST_STANDARD);
        assert_eq!(curator.costs.government, COST_STANDARD);
        assert_eq!(curator.costs.culture, 2);
    }

    #[test]
    fn efforts_wasted_removes_most_recent_purchase() {
        let mut state = state();
        let curator = state.player_mut(Role::Curator);
        curator.inventory = ResourceAmount {
            culture: 20,
            finance: 5,
            government: 5,
            legacy: 20,
            science: 5,
        };
        curator.purchase(AccomplishmentId::new(101), 3).unwrap();
        curator.purchase(AccomplishmentId::new(102), 3).unwrap();
        assert_eq!(curator.victory_points, 3);

        MarsEvent::new(Box::new(EffortsWasted))
            .finalize(&mut state)
            .unwrap();

        let curator = state.player(Role::Curator);
        assert_eq!(curator.victory_points, 1);
        assert_eq!(curator.accomplishments.purchased.len(), 1);
        assert_eq!(
            state.logs().first().map(|m| m.content.as_str()),
            Some("The following players lost their most recent accomplishment: Curator")
        );
    }

    #[test]
    fn changing_tides_leaves_one_card() {
        let mut state = state();
        MarsEvent::new(Box::new(ChangingTides))
            .finalize(&mut state)
            .unwrap();
        for player in state.players().iter() {
            assert_eq!(player.accomplishments.active.len(), 1);
        }
    }
}
