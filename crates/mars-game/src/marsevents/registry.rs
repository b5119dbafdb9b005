//! Mapping from Mars event type ids to factories.
//!
//! The builtin catalog is registered once by [`register_builtin_events`]
//! and exposed through [`builtin`] as an immutable, process-wide value.
//! Tests and tools may build their own registries.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use mars_types::MarsEventSerialized;
use rand::RngCore;

use super::{MarsEvent, MarsEventBehavior, hazards, modifiers, votes};
use crate::error::GameError;

/// Builds a behavior from optional persisted data.
///
/// The random source is only consulted by behaviors that fix a random
/// choice when drawn. Rebuilding from persisted data never needs it.
pub type EventFactory =
    fn(Option<serde_json::Value>, &mut dyn RngCore) -> Result<Box<dyn MarsEventBehavior>, GameError>;

/// Registered Mars event factories keyed by type id.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    factories: BTreeMap<&'static str, EventFactory>,
}

impl EventRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `id`.
    ///
    /// # Errors
    ///
    /// [`GameError::DuplicateEventType`] if `id` is already registered.
    pub fn register(&mut self, id: &'static str, factory: EventFactory) -> Result<(), GameError> {
        if self.factories.contains_key(id) {
            return Err(GameError::DuplicateEventType { id: id.to_owned() });
        }
        self.factories.insert(id, factory);
        Ok(())
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Construct a fresh event of type `id`.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownEventType`] if `id` is not registered, or
    /// [`GameError::MalformedPayload`] if `data` does not fit the type.
    pub fn construct(
        &self,
        id: &str,
        data: Option<serde_json::Value>,
        rng: &mut dyn RngCore,
    ) -> Result<MarsEvent, GameError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| GameError::UnknownEventType { id: id.to_owned() })?;
        Ok(MarsEvent::new(factory(data, rng)?))
    }

    /// Rebuild an event from its persisted form.
    ///
    /// # Errors
    ///
    /// As [`EventRegistry::construct`].
    pub fn construct_serialized(
        &self,
        serialized: &MarsEventSerialized,
        rng: &mut dyn RngCore,
    ) -> Result<MarsEvent, GameError> {
        self.construct(&serialized.id, serialized.data.clone(), rng)
    }
}

/// Every builtin Mars event type id with its factory.
pub const BUILTIN_EVENTS: [(&str, EventFactory); 21] = [
    ("Sandstorm", hazards::sandstorm),
    ("HullBreach", hazards::hull_breach),
    ("CropFailure", hazards::crop_failure),
    ("LifeAsUsual", hazards::life_as_usual),
    ("Audit", hazards::audit),
    ("SolarFlare", hazards::solar_flare),
    ("MarketsClosed", hazards::markets_closed),
    ("Stymied", modifiers::stymied),
    ("DifficultConditions", modifiers::difficult_conditions),
    ("Interdisciplinary", modifiers::interdisciplinary),
    ("EffortsWasted", modifiers::efforts_wasted),
    ("ChangingTides", modifiers::changing_tides),
    ("OutOfCommissionCurator", modifiers::out_of_commission_curator),
    ("OutOfCommissionEntrepreneur", modifiers::out_of_commission_entrepreneur),
    ("OutOfCommissionPioneer", modifiers::out_of_commission_pioneer),
    ("OutOfCommissionPolitician", modifiers::out_of_commission_politician),
    ("OutOfCommissionResearcher", modifiers::out_of_commission_researcher),
    ("PersonalGain", votes::PersonalGain::factory),
    ("CompulsivePhilanthropy", votes::CompulsivePhilanthropy::factory),
    ("BondingThroughAdversity", votes::BondingThroughAdversity::factory),
    ("BreakdownOfTrust", votes::BreakdownOfTrust::factory),
];

/// Register every builtin Mars event type. Nothing is registered unless
/// every builtin id is free.
///
/// # Errors
///
/// [`GameError::DuplicateEventType`] if any builtin id is already present.
pub fn register_builtin_events(registry: &mut EventRegistry) -> Result<(), GameError> {
    if let Some((id, _)) = BUILTIN_EVENTS.iter().find(|(id, _)| registry.contains(id)) {
        return Err(GameError::DuplicateEventType {
            id: (*id).to_owned(),
        });
    }
    for (id, factory) in BUILTIN_EVENTS {
        registry.register(id, factory)?;
    }
    Ok(())
}

static BUILTIN: OnceLock<EventRegistry> = OnceLock::new();

/// The process-wide registry of builtin events, built on first use.
pub fn builtin() -> &'static EventRegistry {
    BUILTIN.get_or_init(|| {
        let registry = EventRegistry {
            factories: BUILTIN_EVENTS.into_iter().collect(),
        };
        debug_assert_eq!(
            registry.len(),
            BUILTIN_EVENTS.len(),
            "builtin mars event ids must be unique"
        );
        tracing::debug!(count = registry.len(), "registered builtin mars events");
        registry
    })
}
