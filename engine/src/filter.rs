//! Filter predicates: search text, tag selection and favorites.

use crate::{Card, EntityId, Stack};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The three filter inputs. The default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Case-insensitive substring; empty matches everything
    pub search: String,
    /// Selected tags; empty matches everything
    pub tag_ids: BTreeSet<EntityId>,
    /// Only favorite cards
    pub favorites_only: bool,
}

impl Filter {
    /// Whether any input narrows the view.
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || !self.tag_ids.is_empty() || self.favorites_only
    }

    /// Whether a card passes all three predicates.
    pub fn matches_card(&self, card: &Card) -> bool {
        self.matches_text(card.sides.iter().flat_map(|s| s.searchable_text()))
            && self.matches_tags(&card.tag_ids)
            && (!self.favorites_only || card.favorite)
    }

    /// Whether a stack passes the search and tag predicates.
    ///
    /// The favorites flag applies to cards only.
    pub fn matches_stack(&self, stack: &Stack) -> bool {
        let languages = stack
            .source_language
            .iter()
            .chain(stack.target_language.iter())
            .map(String::as_str);
        self.matches_text(std::iter::once(stack.title.as_str()).chain(languages))
            && self.matches_tags(&stack.tag_ids)
    }

    /// Cards passing the filter, in their given order.
    pub fn apply_to_cards(&self, cards: &[Card]) -> Vec<Card> {
        cards
            .iter()
            .filter(|c| self.matches_card(c))
            .cloned()
            .collect()
    }

    /// Stacks passing the filter, in their given order.
    pub fn apply_to_stacks(&self, stacks: &[Stack]) -> Vec<Stack> {
        stacks
            .iter()
            .filter(|s| self.matches_stack(s))
            .cloned()
            .collect()
    }

    fn matches_text<'a>(&self, mut texts: impl Iterator<Item = &'a str>) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        texts.any(|text| text.to_lowercase().contains(&needle))
    }

    fn matches_tags(&self, tag_ids: &BTreeSet<EntityId>) -> bool {
        self.tag_ids.is_empty() || !self.tag_ids.is_disjoint(tag_ids)
    }
}
