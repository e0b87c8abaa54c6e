//! The entity abstraction shared by every persisted type.
//!
//! Stores and persistence adapters are generic over [`Entity`]; the trait
//! carries exactly what they need: identity, ownership, the modification
//! timestamp used for ordering, and validation.

use crate::{error::Result, EntityId, Timestamp};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Kind of a persisted entity. Doubles as the collection name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Stack,
    Card,
    Tag,
    Setting,
}

impl EntityKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Stack => "stack",
            EntityKind::Card => "card",
            EntityKind::Tag => "tag",
            EntityKind::Setting => "setting",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stack" => Some(EntityKind::Stack),
            "card" => Some(EntityKind::Card),
            "tag" => Some(EntityKind::Tag),
            "setting" => Some(EntityKind::Setting),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record with identity and a modification timestamp.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind of this entity type.
    const KIND: EntityKind;

    /// Unique identifier.
    fn id(&self) -> &EntityId;

    /// Owner scope, if the entity is partitioned by owner.
    fn owner(&self) -> Option<&str> {
        None
    }

    /// Last modification (milliseconds since epoch).
    fn modified_at(&self) -> Timestamp;

    /// Refresh the modification timestamp.
    fn touch(&mut self, timestamp: Timestamp);

    /// Check the entity may be handed to a store.
    ///
    /// The default rejects an empty identifier.
    fn validate(&self) -> Result<()> {
        if self.id().is_empty() {
            return Err(crate::Error::MissingIdentity { kind: Self::KIND });
        }
        Ok(())
    }
}
