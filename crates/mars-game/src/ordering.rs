//! Deferred actions and their tiered execution queue.
//!
//! Mars events that resolve simultaneous choices do not mutate the state
//! directly from `finalize`. They enqueue a [`DeferredAction`] tagged with
//! an [`ActionOrdering`] tier, and [`flush`] runs the queue: all `First`
//! actions, then `Middle`, then `Last`, insertion order preserved within a
//! tier. The queue is always drained completely in the step that flushes it.
//!
//! Budget changes are carried to the next investment phase as
//! [`RoundEffect`]s. Health changes and donations take effect immediately.

use mars_types::{ActionOrdering, Role};
use serde::{Deserialize, Serialize};

use crate::state::{GameState, RoundEffect};

/// A queued state mutation, described as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeferredAction {
    /// Pay every yes voter in next-round time blocks and charge system
    /// health once for the whole group.
    PersonalGainPayout {
        /// Roles that took the payout, canonical order.
        yes_voters: Vec<Role>,
        /// Time blocks each voter gains, and health lost per voter.
        amount: u32,
        /// Log category.
        category: String,
    },
    /// Convert all of a role's remaining time blocks into system health.
    /// The event logs the donation when it resolves.
    DonateTimeBlocks {
        /// The donor.
        role: Role,
    },
    /// Fix a role's time-block budget for the next investment phase.
    SetTimeBlocks {
        /// The affected role.
        role: Role,
        /// The new budget.
        time_blocks: u32,
        /// Log category.
        category: String,
    },
}

impl DeferredAction {
    /// Apply this action to the state.
    pub fn execute(&self, state: &mut GameState) {
        match self {
            Self::PersonalGainPayout {
                yes_voters,
                amount,
                category,
            } => {
                let count = u32::try_from(yes_voters.len()).unwrap_or(u32::MAX);
                let damage = amount.saturating_mul(count);
                for role in yes_voters {
                    state.carry_over(RoundEffect::GainTimeBlocks {
                        role: *role,
                        amount: *amount,
                    });
                }
                state.decrease_system_health(damage);
                let names: Vec<&str> = yes_voters.iter().map(|r| r.as_str()).collect();
                state.log(
                    format!(
                        "System health decreased by {damage}. The following players voted yes: {}",
                        names.join(",")
                    ),
                    category.as_str(),
                );
            }
            Self::DonateTimeBlocks { role } => {
                let donated = core::mem::take(&mut state.player_mut(*role).time_blocks);
                state.increase_system_health(donated);
            }
            Self::SetTimeBlocks {
                role,
                time_blocks,
                category,
            } => {
                state.carry_over(RoundEffect::SetTimeBlocks {
                    role: *role,
                    time_blocks: *time_blocks,
                });
                state.log(
                    format!("{role} has {time_blocks} time blocks to invest during this round."),
                    category.as_str(),
                );
            }
        }
    }
}

/// Pending deferred actions with their tiers, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionQueue {
    entries: Vec<(ActionOrdering, DeferredAction)>,
}

impl ActionQueue {
    /// Queue an action in the given tier.
    pub fn enqueue(&mut self, tier: ActionOrdering, action: DeferredAction) {
        self.entries.push((tier, action));
    }

    /// Number of queued actions.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empty the queue, returning its actions in execution order.
    pub fn drain_ordered(&mut self) -> Vec<DeferredAction> {
        let mut entries = core::mem::take(&mut self.entries);
        // sort_by_key is stable, which keeps insertion order within a tier.
        entries.sort_by_key(|(tier, _)| *tier);
        entries.into_iter().map(|(_, action)| action).collect()
    }
}

/// Run and clear every action queued on the state.
pub fn flush(state: &mut GameState) {
    let actions = state.pending_actions_mut().drain_ordered();
    for action in &actions {
        action.execute(state);
    }
    if !actions.is_empty() {
        tracing::debug!(count = actions.len(), round = state.round(), "flushed deferred actions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn set(role: Role, time_blocks: u32) -> DeferredAction {
        DeferredAction::SetTimeBlocks {
            role,
            time_blocks,
            category: "Test".to_owned(),
        }
    }

    #[test]
    fn drain_orders_by_tier_then_insertion() {
        let mut queue = ActionQueue::default();
        queue.enqueue(ActionOrdering::Last, set(Role::Curator, 4));
        queue.enqueue(ActionOrdering::First, set(Role::Curator, 1));
        queue.enqueue(ActionOrdering::Middle, set(Role::Curator, 3));
        queue.enqueue(ActionOrdering::First, set(Role::Curator, 2));

        let order: Vec<u32> = queue
            .drain_ordered()
            .iter()
            .filter_map(|a| match a {
                DeferredAction::SetTimeBlocks { time_blocks, .. } => Some(*time_blocks),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_executes_in_tier_order_and_empties_queue() {
        let mut state = GameState::new(GameConfig::default());
        let queue = state.pending_actions_mut();
        queue.enqueue(ActionOrdering::Last, set(Role::Pioneer, 7));
        queue.enqueue(ActionOrdering::First, set(Role::Pioneer, 1));
        queue.enqueue(ActionOrdering::Middle, set(Role::Pioneer, 5));
        queue.enqueue(ActionOrdering::First, set(Role::Pioneer, 2));

        flush(&mut state);

        assert!(state.pending_actions().is_empty());
        state.begin_next_round();
        assert_eq!(state.player(Role::Pioneer).time_blocks, 7);
        let contents: Vec<&str> = state.logs().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Pioneer has 1 time blocks to invest during this round.",
                "Pioneer has 2 time blocks to invest during this round.",
                "Pioneer has 5 time blocks to invest during this round.",
                "Pioneer has 7 time blocks to invest during this round.",
            ]
        );
    }

    #[test]
    fn personal_gain_payout_charges_health_once() {
        let mut state = GameState::new(GameConfig::default());
        DeferredAction::PersonalGainPayout {
            yes_voters: vec![Role::Curator, Role::Pioneer],
            amount: 6,
            category: "Mars Event: Personal Gain".to_owned(),
        }
        .execute(&mut state);
        assert_eq!(state.system_health(), 88);
        assert_eq!(state.player(Role::Curator).time_blocks, 10);
        assert_eq!(
            state.logs().first().map(|m| m.content.as_str()),
            Some("System health decreased by 12. The following players voted yes: Curator,Pioneer")
        );

        state.begin_next_round();
        assert_eq!(state.player(Role::Curator).time_blocks, 16);
        assert_eq!(state.player(Role::Pioneer).time_blocks, 16);
        assert_eq!(state.player(Role::Entrepreneur).time_blocks, 10);
    }

    #[test]
    fn donate_moves_time_blocks_into_health() {
        let mut state = GameState::new(GameConfig::default());
        state.decrease_system_health(30);
        DeferredAction::DonateTimeBlocks {
            role: Role::Politician,
        }
        .execute(&mut state);
        assert_eq!(state.system_health(), 80);
        assert_eq!(state.player(Role::Politician).time_blocks, 0);
        assert!(state.logs().is_empty());
    }
}
