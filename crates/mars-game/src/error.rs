//! Error types for the mars-game crate.
//!
//! Every rule violation is a typed [`GameError`] returned to the caller; the
//! state is left untouched whenever an operation fails. Durability failures
//! from an event log surface as [`PersistenceError`].

use mars_types::{AccomplishmentId, GameId, Phase, Role};

/// Errors raised while validating or applying game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No factory is registered under the given Mars event id.
    #[error("unknown mars event type: {id}")]
    UnknownEventType {
        /// The unrecognised event id.
        id: String,
    },

    /// A factory was registered twice under the same id.
    #[error("mars event type registered twice: {id}")]
    DuplicateEventType {
        /// The duplicated id.
        id: String,
    },

    /// A durable record carries a type tag no game event uses.
    #[error("unknown game event type: {event_type}")]
    UnknownGameEventType {
        /// The unrecognised tag.
        event_type: String,
    },

    /// A string did not name one of the five roles.
    #[error("invalid role: {value:?}")]
    InvalidRole {
        /// The rejected input.
        value: String,
    },

    /// The operation is not valid in the current phase.
    #[error("{operation} is not valid during the {phase} phase")]
    InvalidPhaseTransition {
        /// The phase the game was in.
        phase: Phase,
        /// What was attempted.
        operation: String,
    },

    /// A response or second finalize reached an event that already finalized.
    #[error("mars event {id} has already been finalized")]
    EventAlreadyFinalized {
        /// The event type id.
        id: String,
    },

    /// The active event does not accept this response.
    #[error("invalid response to {id}: {reason}")]
    InvalidResponse {
        /// The event type id.
        id: String,
        /// Why the response was rejected.
        reason: String,
    },

    /// A payload or event data blob did not have the expected shape.
    #[error("malformed payload for {context}: {reason}")]
    MalformedPayload {
        /// What was being decoded.
        context: String,
        /// Decoder message.
        reason: String,
    },

    /// No Mars event is awaiting responses or finalization.
    #[error("no active mars event")]
    NoActiveEvent,

    /// A player tried to spend more time blocks than they have.
    #[error("{role} needs {required} time blocks but has {available}")]
    InsufficientTimeBlocks {
        /// The spending player.
        role: Role,
        /// Time blocks the operation costs.
        required: u32,
        /// Time blocks the player holds.
        available: u32,
    },

    /// A player does not hold the resources an operation requires.
    #[error("{role} does not hold the resources required to {operation}")]
    InsufficientResources {
        /// The player lacking resources.
        role: Role,
        /// What was attempted.
        operation: String,
    },

    /// Trading is disabled for the rest of the round.
    #[error("trading is disabled this round")]
    TradingDisabled,

    /// A trade proposal is invalid independently of inventories.
    #[error("invalid trade: {reason}")]
    InvalidTrade {
        /// Why the trade was rejected.
        reason: String,
    },

    /// The accomplishment is not in the player's active hand.
    #[error("{role} has no active accomplishment {id}")]
    UnknownAccomplishment {
        /// The player.
        role: Role,
        /// The requested card.
        id: AccomplishmentId,
    },

    /// An arithmetic overflow occurred while computing a game quantity.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// Neither terminal condition holds, so finalize cannot pick an outcome.
    #[error(
        "game {game_id} cannot be finalized: round {round} of {max_round}, system health {system_health}"
    )]
    IndeterminateFinalization {
        /// The game.
        game_id: GameId,
        /// Current round.
        round: u32,
        /// Configured final round.
        max_round: u32,
        /// Current system health.
        system_health: u32,
    },

    /// A log does not begin with the game initialization record.
    #[error("event log for game {game_id} does not begin with gameInitialized")]
    MissingInitialization {
        /// The game.
        game_id: GameId,
    },

    /// A record belongs to a different game than the one being replayed.
    #[error("record belongs to game {found}, expected game {expected}")]
    GameMismatch {
        /// The game being replayed.
        expected: GameId,
        /// The game named by the record.
        found: GameId,
    },

    /// The event log failed.
    #[error("persistence failed: {source}")]
    Persistence {
        /// The underlying persistence error.
        #[from]
        source: PersistenceError,
    },
}

impl GameError {
    /// Build a [`GameError::MalformedPayload`] from a decoder error.
    pub fn malformed(context: impl Into<String>, reason: impl core::fmt::Display) -> Self {
        Self::MalformedPayload {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`GameError::InvalidPhaseTransition`].
    pub fn wrong_phase(phase: Phase, operation: impl Into<String>) -> Self {
        Self::InvalidPhaseTransition {
            phase,
            operation: operation.into(),
        }
    }

    /// Build a [`GameError::ArithmeticOverflow`].
    pub fn overflow(context: impl Into<String>) -> Self {
        Self::ArithmeticOverflow {
            context: context.into(),
        }
    }
}

/// Errors raised by an event log while reading or appending records.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Appending a batch failed. Nothing from the batch was written.
    #[error("event log append failed: {reason}")]
    Write {
        /// Backend message.
        reason: String,
    },

    /// Reading records or game status failed.
    #[error("event log read failed: {reason}")]
    Read {
        /// Backend message.
        reason: String,
    },

    /// A game event could not be encoded as a record payload.
    #[error("failed to encode game event: {source}")]
    Encode {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
