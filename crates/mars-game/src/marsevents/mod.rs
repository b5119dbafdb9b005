//! Mars events: random perturbations drawn at the start of each event phase.
//!
//! Each event type implements [`MarsEventBehavior`] and declares which
//! optional hooks it supports through [`Capabilities`]. The [`MarsEvent`]
//! wrapper owns a behavior and enforces the lifecycle: initialize at most
//! once, accept responses only while open, finalize exactly once.
//!
//! # Modules
//!
//! - [`registry`] -- Type id to factory mapping, builtin registration
//! - [`hazards`] -- Fixed health and trading effects
//! - [`modifiers`] -- Round-scoped cost, budget, and hand changes
//! - [`votes`] -- Events resolved from player responses

pub mod hazards;
pub mod modifiers;
pub mod registry;
pub mod votes;

use mars_types::{EventResponse, MarsEventSerialized, MarsLogCategory, Role};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::GameError;
use crate::state::GameState;

pub use registry::{EventFactory, EventRegistry, builtin, register_builtin_events};

// ---------------------------------------------------------------------------
// Behavior contract
// ---------------------------------------------------------------------------

/// Optional hooks a behavior implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Runs `initialize` when the event becomes active.
    pub initialize: bool,
    /// Accepts player responses.
    pub respond: bool,
}

impl Capabilities {
    /// Finalize only.
    pub const NONE: Self = Self {
        initialize: false,
        respond: false,
    };

    /// Accepts responses.
    pub const RESPOND: Self = Self {
        initialize: false,
        respond: true,
    };

    /// Initializes and accepts responses.
    pub const INITIALIZE_AND_RESPOND: Self = Self {
        initialize: true,
        respond: true,
    };
}

/// The behavior of one Mars event type.
pub trait MarsEventBehavior: core::fmt::Debug + Send + Sync {
    /// Registered type id.
    fn id(&self) -> &'static str;

    /// Hooks this behavior implements beyond `finalize`.
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Prepare the state when the event becomes active.
    ///
    /// # Errors
    ///
    /// Behavior specific.
    fn initialize(&mut self, _state: &mut GameState) -> Result<(), GameError> {
        Ok(())
    }

    /// Record one player's response.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidResponse`] if the response kind does not apply.
    fn respond(&mut self, _role: Role, response: &EventResponse) -> Result<(), GameError> {
        Err(wrong_response(self.id(), response))
    }

    /// Apply the event's effect.
    ///
    /// # Errors
    ///
    /// Behavior specific.
    fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError>;

    /// Mutable data to persist, or `None` for stateless behaviors.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if the data cannot be encoded.
    fn data(&self) -> Result<Option<serde_json::Value>, GameError> {
        Ok(None)
    }

    /// Clone into a fresh box.
    fn clone_box(&self) -> Box<dyn MarsEventBehavior>;
}

// ---------------------------------------------------------------------------
// Lifecycle wrapper
// ---------------------------------------------------------------------------

/// A drawn Mars event and its lifecycle flags.
#[derive(Debug)]
pub struct MarsEvent {
    behavior: Box<dyn MarsEventBehavior>,
    initialized: bool,
    finalized: bool,
}

impl Clone for MarsEvent {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone_box(),
            initialized: self.initialized,
            finalized: self.finalized,
        }
    }
}

impl MarsEvent {
    /// Wrap a freshly constructed behavior.
    pub const fn new(behavior: Box<dyn MarsEventBehavior>) -> Self {
        Self {
            behavior,
            initialized: false,
            finalized: false,
        }
    }

    /// Registered type id.
    pub fn id(&self) -> &'static str {
        self.behavior.id()
    }

    /// Hooks the behavior implements.
    pub fn capabilities(&self) -> Capabilities {
        self.behavior.capabilities()
    }

    /// Whether `finalize` has run.
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Run the behavior's `initialize` hook if it has one and it has not
    /// run yet.
    ///
    /// # Errors
    ///
    /// [`GameError::EventAlreadyFinalized`] after finalize, or whatever the
    /// behavior returns.
    pub fn initialize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        self.ensure_open()?;
        if self.initialized || !self.capabilities().initialize {
            return Ok(());
        }
        self.behavior.initialize(state)?;
        self.initialized = true;
        Ok(())
    }

    /// Pass a player's response to the behavior.
    ///
    /// # Errors
    ///
    /// [`GameError::EventAlreadyFinalized`] after finalize, or
    /// [`GameError::InvalidResponse`] if the behavior takes no responses or
    /// rejects this one.
    pub fn respond(&mut self, role: Role, response: &EventResponse) -> Result<(), GameError> {
        self.ensure_open()?;
        if !self.capabilities().respond {
            return Err(GameError::InvalidResponse {
                id: self.id().to_owned(),
                reason: "this event takes no responses".to_owned(),
            });
        }
        self.behavior.respond(role, response)
    }

    /// Apply the event. Runs exactly once.
    ///
    /// # Errors
    ///
    /// [`GameError::EventAlreadyFinalized`] on a second call, or whatever
    /// the behavior returns.
    pub fn finalize(&mut self, state: &mut GameState) -> Result<(), GameError> {
        self.ensure_open()?;
        self.behavior.finalize(state)?;
        self.finalized = true;
        tracing::debug!(event = self.id(), round = state.round(), "mars event finalized");
        Ok(())
    }

    /// The persisted form: type id and data.
    ///
    /// # Errors
    ///
    /// [`GameError::MalformedPayload`] if the data cannot be encoded.
    pub fn to_serialized(&self) -> Result<MarsEventSerialized, GameError> {
        Ok(MarsEventSerialized {
            id: self.id().to_owned(),
            data: self.behavior.data()?,
        })
    }

    fn ensure_open(&self) -> Result<(), GameError> {
        if self.finalized {
            return Err(GameError::EventAlreadyFinalized {
                id: self.id().to_owned(),
            });
        }
        Ok(())
    }
}

impl Serialize for MarsEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data = self
            .behavior
            .data()
            .map_err(serde::ser::Error::custom)?;
        let mut out = serializer.serialize_struct("MarsEvent", 3)?;
        out.serialize_field("id", self.id())?;
        out.serialize_field("data", &data)?;
        out.serialize_field("finalized", &self.finalized)?;
        out.end()
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by behaviors
// ---------------------------------------------------------------------------

/// `"OutOfCommissionPioneer"` becomes `"Out Of Commission Pioneer"`.
pub fn spaced_name(id: &str) -> String {
    let mut out = String::with_capacity(id.len().saturating_add(4));
    for (i, ch) in id.chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

/// Log category for messages written by an event type.
pub fn event_category(id: &str) -> String {
    format!("{}: {}", MarsLogCategory::Event.label(), spaced_name(id))
}

/// Decode constructor data, falling back to the default when absent.
pub(crate) fn decode_data<T: DeserializeOwned + Default>(
    id: &str,
    data: Option<serde_json::Value>,
) -> Result<T, GameError> {
    match data {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| GameError::malformed(id, e)),
    }
}

/// Encode behavior data.
pub(crate) fn encode_data<T: Serialize>(
    id: &str,
    data: &T,
) -> Result<Option<serde_json::Value>, GameError> {
    serde_json::to_value(data)
        .map(Some)
        .map_err(|e| GameError::malformed(id, e))
}

pub(crate) fn wrong_response(id: &str, response: &EventResponse) -> GameError {
    GameError::InvalidResponse {
        id: id.to_owned(),
        reason: format!("unexpected response {response:?}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::marsevents::hazards::SANDSTORM;

    #[test]
    fn spaced_name_splits_camel_case() {
        assert_eq!(spaced_name("PersonalGain"), "Personal Gain");
        assert_eq!(spaced_name("Sandstorm"), "Sandstorm");
        assert_eq!(event_category("HullBreach"), "Mars Event: Hull Breach");
    }

    #[test]
    fn second_finalize_is_rejected() {
        let mut state = GameState::new(GameConfig::default());
        let mut event = MarsEvent::new(Box::new(SANDSTORM));
        event.finalize(&mut state).unwrap();
        let err = event.finalize(&mut state).unwrap_err();
        assert!(matches!(err, GameError::EventAlreadyFinalized { .. }));
        assert_eq!(state.system_health(), 90);
    }

    #[test]
    fn stateless_event_rejects_responses() {
        let mut event = MarsEvent::new(Box::new(SANDSTORM));
        let err = event
            .respond(Role::Curator, &EventResponse::PersonalGainVote { vote: true })
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidResponse { .. }));
    }

    #[test]
    fn serialized_form_of_stateless_event_has_no_data() {
        let event = MarsEvent::new(Box::new(SANDSTORM));
        assert_eq!(
            event.to_serialized().unwrap(),
            MarsEventSerialized::stateless("Sandstorm")
        );
    }
}
