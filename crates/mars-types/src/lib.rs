//! Shared type definitions for the Port of Mars game core.
//!
//! This crate is the single source of truth for the values that cross a
//! boundary: between the game core and the event log, and between the core
//! and the session layer. Types flow downstream to `TypeScript` via `ts-rs`
//! for the client.
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifier newtypes (games, event records, cards)
//! - [`enums`] -- Roles, resources, investments, phases, log categories, tiers
//! - [`structs`] -- Resource bundles, cost tables, log messages, serialized
//!   Mars events, and game event records
//! - [`commands`] -- The player command envelope

pub mod commands;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use commands::{Command, CommandEnvelope, EventResponse};
pub use enums::{ActionOrdering, Investment, MarsLogCategory, ParseEnumError, Phase, Resource, Role};
pub use ids::{AccomplishmentId, GameEventId, GameId};
pub use structs::{
    Accomplishment, GameEventRecord, InvestmentData, MarsEventSerialized, MarsLogMessage,
    PersistMetadata, ResourceAmount,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes bindings for every type marked #[ts(export)] into
        // the `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::GameId::export_all();
        let _ = crate::ids::GameEventId::export_all();
        let _ = crate::ids::AccomplishmentId::export_all();

        // Enums
        let _ = crate::enums::Role::export_all();
        let _ = crate::enums::Resource::export_all();
        let _ = crate::enums::Investment::export_all();
        let _ = crate::enums::Phase::export_all();
        let _ = crate::enums::MarsLogCategory::export_all();
        let _ = crate::enums::ActionOrdering::export_all();

        // Structs
        let _ = crate::structs::ResourceAmount::export_all();
        let _ = crate::structs::InvestmentData::export_all();
        let _ = crate::structs::MarsLogMessage::export_all();
        let _ = crate::structs::Accomplishment::export_all();
        let _ = crate::structs::MarsEventSerialized::export_all();
        let _ = crate::structs::GameEventRecord::export_all();
        let _ = crate::structs::PersistMetadata::export_all();

        // Commands
        let _ = crate::commands::Command::export_all();
        let _ = crate::commands::EventResponse::export_all();
    }
}
