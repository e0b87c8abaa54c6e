//! Ordering of published views.

use crate::{Card, Entity};

/// Most recently modified first. Stable for equal timestamps.
pub fn sort_by_recency<E: Entity>(entities: &mut [E]) {
    entities.sort_by(|a, b| b.modified_at().cmp(&a.modified_at()));
}

/// Highest index first.
///
/// Only cards with a numeric index take part: they are sorted among the
/// positions they already occupy, while cards without an index keep their
/// position. Equal indices keep their relative order.
pub fn sort_cards(cards: &mut [Card]) {
    let slots: Vec<usize> = cards
        .iter()
        .enumerate()
        .filter(|(_, c)| c.index.is_some())
        .map(|(position, _)| position)
        .collect();

    let mut indexed: Vec<Card> = slots.iter().map(|&slot| cards[slot].clone()).collect();
    indexed.sort_by(|a, b| b.index.cmp(&a.index));

    for (slot, card) in slots.into_iter().zip(indexed) {
        cards[slot] = card;
    }
}
