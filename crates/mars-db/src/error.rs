//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with additional context about which operation failed.

use mars_game::PersistenceError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value does not fit its Rust type.
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Report this error as a failed append to the core.
    pub fn into_write(self) -> PersistenceError {
        PersistenceError::Write {
            reason: self.to_string(),
        }
    }

    /// Report this error as a failed read to the core.
    pub fn into_read(self) -> PersistenceError {
        PersistenceError::Read {
            reason: self.to_string(),
        }
    }
}
