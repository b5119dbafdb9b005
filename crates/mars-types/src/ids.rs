//! Type-safe identifier wrappers around integer keys.
//!
//! Games and game event records are keyed by database sequence numbers, so
//! every identifier here wraps a plain integer. The newtypes prevent mixing a
//! game id with an event sequence number at compile time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around an integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub $inner);

        impl $name {
            /// Wrap a raw integer value.
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a game instance.
    GameId(i64)
}

define_id! {
    /// Durable sequence number of a game event record. Replay order is
    /// ascending by this value.
    GameEventId(i64)
}

define_id! {
    /// Identifier of an accomplishment card.
    AccomplishmentId(u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&GameId::new(42)).ok();
        assert_eq!(json.as_deref(), Some("42"));
    }

    #[test]
    fn id_roundtrip_serde() {
        let restored: Result<GameEventId, _> = serde_json::from_str("17");
        assert_eq!(restored.ok(), Some(GameEventId::new(17)));
    }

    #[test]
    fn id_display_matches_inner() {
        let id = AccomplishmentId::new(7);
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn ids_order_by_inner_value() {
        assert!(GameEventId::new(3) < GameEventId::new(10));
    }
}
