//! The persistence envelope shared by every backend.

use crate::{Entity, EntityId, EntityKind, Error, Timestamp};
use serde::{Deserialize, Serialize};

/// Server-assigned change sequence number.
pub type Sequence = u64;

/// An entity as it is stored by a document backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Entity identifier
    pub id: EntityId,
    /// Entity kind (collection)
    pub kind: EntityKind,
    /// Owner partition; `None` for globally scoped documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// The entity itself as JSON
    pub body: serde_json::Value,
    /// Soft delete flag (tombstone)
    #[serde(default)]
    pub deleted: bool,
    /// Modification timestamp of the entity
    pub updated_at: Timestamp,
    /// Change sequence; 0 until a backend assigns one
    #[serde(default)]
    pub seq: Sequence,
}

impl Document {
    /// Wrap an entity.
    pub fn from_entity<E: Entity>(entity: &E) -> crate::error::Result<Self> {
        let body = serde_json::to_value(entity).map_err(|e| Error::InvalidBody {
            id: entity.id().clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            id: entity.id().clone(),
            kind: E::KIND,
            owner: entity.owner().map(str::to_string),
            body,
            deleted: false,
            updated_at: entity.modified_at(),
            seq: 0,
        })
    }

    /// Tombstone for an entity.
    pub fn tombstone<E: Entity>(entity: &E, timestamp: Timestamp) -> crate::error::Result<Self> {
        let mut document = Self::from_entity(entity)?;
        document.deleted = true;
        document.updated_at = timestamp;
        Ok(document)
    }

    /// Unwrap into a typed entity.
    pub fn to_entity<E: Entity>(&self) -> crate::error::Result<E> {
        if self.kind != E::KIND {
            return Err(Error::KindMismatch {
                expected: E::KIND,
                actual: self.kind,
            });
        }

        serde_json::from_value(self.body.clone()).map_err(|e| Error::InvalidBody {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    /// Check if document is active (not deleted).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}
