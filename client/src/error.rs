//! Unified error handling for the client.

use crate::config::ConfigError;
use cardbox_engine::{EntityId, EntityKind};

/// Client error type.
///
/// Validation failures (`Engine` with an invalid-argument cause) are raised
/// before any IO. Everything else comes from a backend and has also been
/// published on the error channel of the store that issued the call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] cardbox_engine::Error),

    #[error("no stack in focus")]
    NoStackInFocus,

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("backend rejected request ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether the call was rejected locally because of its argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::Engine(e) if e.is_invalid_argument())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
