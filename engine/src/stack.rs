//! Stacks: named, owned collections of cards.

use crate::{Card, Entity, EntityId, EntityKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named collection of cards plus its tags.
///
/// Cards are embedded: a card belongs to exactly one stack and is persisted
/// as part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    /// Unique identifier
    pub id: EntityId,
    /// Owning user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Display title
    pub title: String,
    /// Language of the front sides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    /// Language of the back sides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    /// Cards in insertion order
    #[serde(default)]
    pub cards: Vec<Card>,
    /// Referenced tags (by id)
    #[serde(default)]
    pub tag_ids: BTreeSet<EntityId>,
    /// Creation (milliseconds since epoch)
    pub created_at: Timestamp,
    /// Last modification (milliseconds since epoch)
    pub modified_at: Timestamp,
}

impl Stack {
    /// Create an empty stack.
    pub fn new(id: impl Into<EntityId>, title: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            owner: None,
            title: title.into(),
            source_language: None,
            target_language: None,
            cards: Vec::new(),
            tag_ids: BTreeSet::new(),
            created_at: timestamp,
            modified_at: timestamp,
        }
    }

    /// Builder-style owner assignment.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Builder-style tag assignment.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        self.tag_ids = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Get a card by ID.
    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Get a card by ID for modification.
    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Append a card.
    pub fn push_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Replace the card with the same ID. Returns false if it is not in the stack.
    pub fn replace_card(&mut self, card: Card) -> bool {
        match self.cards.iter_mut().find(|c| c.id == card.id) {
            Some(slot) => {
                *slot = card;
                true
            }
            None => false,
        }
    }

    /// Remove a card by ID, returning it.
    pub fn remove_card(&mut self, id: &str) -> Option<Card> {
        let position = self.cards.iter().position(|c| c.id == id)?;
        Some(self.cards.remove(position))
    }
}

impl Entity for Stack {
    const KIND: EntityKind = EntityKind::Stack;

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
