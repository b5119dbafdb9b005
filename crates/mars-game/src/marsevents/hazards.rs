//! Events with a fixed effect: a set amount of system health damage, an
//! optional trading shutdown, and one log line. None of them hold data or
//! take responses.

use rand::RngCore;

use super::{MarsEventBehavior, event_category};
use crate::error::GameError;
use crate::state::GameState;

/// A fixed-effect event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hazard {
    id: &'static str,
    damage: u32,
    disables_trading: bool,
    message: &'static str,
}

impl Hazard {
    /// System health lost when the event resolves.
    pub const fn damage(&self) -> u32 {
        self.damage
    }
}

/// Sandstorm: 10 system health.
pub const SANDSTORM: Hazard = Hazard {
    id: "Sandstorm",
    damage: 10,
    disables_trading: false,
    message: "A sandstorm has decreased system health by 10.",
};

/// Hull breach: 7 system health.
pub const HULL_BREACH: Hazard = Hazard {
    id: "HullBreach",
    damage: 7,
    disables_trading: false,
    message: "A hull breach has destroyed 7 System Health.",
};

/// Crop failure: 20 system health.
pub const CROP_FAILURE: Hazard = Hazard {
    id: "CropFailure",
    damage: 20,
    disables_trading: false,
    message: "Crop failure has destroyed 20 system health.",
};

/// Nothing happens.
pub const LIFE_AS_USUAL: Hazard = Hazard {
    id: "LifeAsUsual",
    damage: 0,
    disables_trading: false,
    message: "As the first human outpost on Mars, having a \"usual\" day is pretty unusual.",
};

/// Inventories are public for the round.
pub const AUDIT: Hazard = Hazard {
    id: "Audit",
    damage: 0,
    disables_trading: false,
    message: "You will be able to view other players' resources. Hover over each player tab \
              on the right to reveal their inventory.",
};

/// Solar flare: 5 system health and no trading.
pub const SOLAR_FLARE: Hazard = Hazard {
    id: "SolarFlare",
    damage: 5,
    disables_trading: true,
    message: "A Solar Flare has destroyed 5 System Health. Chat and trade are not available in \
              this round.",
};

/// No trading for the round.
pub const MARKETS_CLOSED: Hazard = Hazard {
    id: "MarketsClosed",
    damage: 0,
    disables_trading: true,
    message: "Markets Closed: Players may not trade Influences this round.",
};

/// Every hazard, for registration.
pub const ALL: [Hazard; 7] = [
    SANDSTORM,
    HULL_BREACH,
    CROP_FAILURE,
    LIFE_AS_USUAL,
    AUDIT,
    SOLAR_FLARE,
    MARKETS_CLOSED,
];

impl MarsEventBehavior for Hazard {
    fn id(&self) -> &'static str {
        self.id
    }

    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        if self.damage > 0 {
            state.decrease_system_health(self.damage);
        }
        if self.disables_trading {
            state.disable_trading();
        }
        state.log(self.message, event_category(self.id));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MarsEventBehavior> {
        Box::new(*self)
    }
}

/// Look up a hazard by id.
pub fn by_id(id: &str) -> Option<Hazard> {
    ALL.into_iter().find(|h| h.id == id)
}

/// Factory shared by every hazard id. Data is ignored.
macro_rules! hazard_factory {
    ($name:ident, $hazard:expr) => {
        /// Construct this hazard. Constructor data is ignored.
        ///
        /// # Errors
        ///
        /// Never fails.
        pub fn $name(
            _data: Option<serde_json::Value>,
            _rng: &mut dyn RngCore,
        ) -> Result<Box<dyn MarsEventBehavior>, GameError> {
            Ok(Box::new($hazard))
        }
    };
}

hazard_factory!(sandstorm, SANDSTORM);
hazard_factory!(hull_breach, HULL_BREACH);
hazard_factory!(crop_failure, CROP_FAILURE);
hazard_factory!(life_as_usual, LIFE_AS_USUAL);
hazard_factory!(audit, AUDIT);
hazard_factory!(solar_flare, SOLAR_FLARE);
hazard_factory!(markets_closed, MARKETS_CLOSED);
