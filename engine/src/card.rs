//! Cards and their sides.

use crate::{Entity, EntityId, EntityKind, Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A conjugation table entry of a side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tense {
    /// Name of the tense, e.g. "present"
    pub name: String,
    /// Conjugated forms
    #[serde(default)]
    pub forms: Vec<String>,
}

/// An answer option of a quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl QuizOption {
    pub fn new(text: impl Into<String>, correct: bool) -> Self {
        Self {
            text: text.into(),
            correct,
        }
    }
}

/// One face of a card. Owned by its card, no identity of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Side {
    /// Main text of the side
    pub title: String,
    /// Free-form additional information
    #[serde(default)]
    pub information: String,
    /// Example sentences
    #[serde(default)]
    pub examples: Vec<String>,
    /// Conjugation tables
    #[serde(default)]
    pub tenses: Vec<Tense>,
    /// Quiz answer options
    #[serde(default)]
    pub quiz_options: Vec<QuizOption>,
}

impl Side {
    /// Create a side with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// All text of this side that participates in search.
    pub fn searchable_text(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str())
            .chain(std::iter::once(self.information.as_str()))
            .chain(self.examples.iter().map(String::as_str))
            .chain(self.quiz_options.iter().map(|o| o.text.as_str()))
    }
}

/// A study unit with two or more sides, a Leitner box and an ordering index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Unique identifier
    pub id: EntityId,
    /// Front, back and optional further sides
    pub sides: Vec<Side>,
    /// Leitner box; unset means box 0
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub box_number: Option<u32>,
    /// Ordering index; may be negative, need not be contiguous
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Marked as favorite
    #[serde(default)]
    pub favorite: bool,
    /// Referenced tags (by id)
    #[serde(default)]
    pub tag_ids: BTreeSet<EntityId>,
    /// Last modification (milliseconds since epoch)
    pub modified_at: Timestamp,
}

impl Card {
    /// Create a two-sided card.
    pub fn new(
        id: impl Into<EntityId>,
        front: impl Into<String>,
        back: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self::with_sides(id, vec![Side::titled(front), Side::titled(back)], timestamp)
    }

    /// Create a card from explicit sides.
    pub fn with_sides(id: impl Into<EntityId>, sides: Vec<Side>, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            sides,
            box_number: None,
            index: None,
            favorite: false,
            tag_ids: BTreeSet::new(),
            modified_at: timestamp,
        }
    }

    /// Builder-style index assignment.
    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
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

    /// Box the card is in, treating unset as 0.
    pub fn box_or_first(&self) -> u32 {
        self.box_number.unwrap_or(0)
    }

    /// Front side, if present.
    pub fn front(&self) -> Option<&Side> {
        self.sides.first()
    }

    /// Back side, if present.
    pub fn back(&self) -> Option<&Side> {
        self.sides.get(1)
    }
}

impl Entity for Card {
    const KIND: EntityKind = EntityKind::Card;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    fn touch(&mut self, timestamp: Timestamp) {
        self.modified_at = timestamp;
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.id.is_empty() {
            return Err(Error::MissingIdentity { kind: Self::KIND });
        }
        if self.sides.len() < 2 {
            return Err(Error::TooFewSides {
                id: self.id.clone(),
                sides: self.sides.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_card_is_unboxed_and_unindexed() {
        let card = Card::new("card-1", "der Hund", "the dog", 1000);
        assert_eq!(card.box_number, None);
        assert_eq!(card.box_or_first(), 0);
        assert_eq!(card.index, None);
        assert_eq!(card.front().unwrap().title, "der Hund");
        assert_eq!(card.back().unwrap().title, "the dog");
    }

    #[test]
    fn validate_requires_identity_and_two_sides() {
        let card = Card::new("", "a", "b", 1000);
        assert!(matches!(
            card.validate(),
            Err(Error::MissingIdentity {
                kind: EntityKind::Card
            })
        ));

        let card = Card::with_sides("card-1", vec![Side::titled("only")], 1000);
        assert!(matches!(
            card.validate(),
            Err(Error::TooFewSides { sides: 1, .. })
        ));

        assert!(Card::new("card-1", "a", "b", 1000).validate().is_ok());
    }

    #[test]
    fn box_serializes_under_its_short_name() {
        let mut card = Card::new("card-1", "a", "b", 1000);
        card.box_number = Some(3);
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["box"], 3);
        assert!(json.get("index").is_none());
    }

    #[test]
    fn sparse_json_deserializes() {
        let json = r#"{
            "id": "card-7",
            "sides": [{"title": "front"}, {"title": "back"}],
            "modifiedAt": 42
        }"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.box_number, None);
        assert!(!card.favorite);
        assert!(card.tag_ids.is_empty());
        assert_eq!(card.sides[0].examples.len(), 0);
    }
}
