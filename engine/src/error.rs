//! Error types for the Cardbox engine.

use crate::{EntityId, EntityKind};
use thiserror::Error;

/// All possible errors from the Cardbox engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid argument: {kind} without identifier")]
    MissingIdentity { kind: EntityKind },

    #[error("card {id} has {sides} side(s), at least 2 required")]
    TooFewSides { id: EntityId, sides: usize },

    #[error("unknown setting key: {0}")]
    UnknownSettingKey(String),

    // Document errors
    #[error("document kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },

    #[error("invalid document body for {id}: {reason}")]
    InvalidBody { id: EntityId, reason: String },

    // Lookup errors
    #[error("card not found: {0}")]
    CardNotFound(EntityId),
}

impl Error {
    /// Whether this error stems from an argument that should never have been
    /// handed to a store (the "null entity" family).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::MissingIdentity { .. } | Error::TooFewSides { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
