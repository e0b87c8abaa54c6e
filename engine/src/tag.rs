//! Tags: shared labels referenced by id from stacks and cards.

use crate::{Entity, EntityId, EntityKind, Timestamp};
use serde::{Deserialize, Serialize};

/// A shared label. Stacks and cards only hold its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub modified_at: Timestamp,
}

impl Tag {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: None,
            modified_at: timestamp,
        }
    }
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tag;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    fn touch(&mut self, timestamp: Timestamp) {
        self.modified_at = timestamp;
    }
}
