//! Leitner scheduling.
//!
//! Stateless functions over card collections: box transitions, index
//! assignment, shuffling and normalization. Stores call these and then
//! persist the owning stack; nothing here performs IO.
//!
//! Index semantics: a higher index is shown first (views sort descending),
//! so sending a card "to the end" gives it an index below every other one.
//! Cards without an index are ignored by the index arithmetic.

use crate::{error::Result, Card, Error};
use rand::Rng;

/// Advance a card by one box. Unset counts as box 0, so the first move lands
/// in box 1. There is no upper bound.
pub fn move_to_next_box(card: &mut Card) {
    card.box_number = Some(match card.box_number {
        Some(current) => current.saturating_add(1),
        None => 1,
    });
}

/// Reset every card to box 0.
pub fn move_all_to_first_box(cards: &mut [Card]) {
    for card in cards {
        card.box_number = Some(0);
    }
}

/// Smallest numeric index, or 0 when no card has one.
pub fn min_index(cards: &[Card]) -> i64 {
    cards.iter().filter_map(|c| c.index).min().unwrap_or(0)
}

/// Largest numeric index, or 0 when no card has one.
pub fn max_index(cards: &[Card]) -> i64 {
    cards.iter().filter_map(|c| c.index).max().unwrap_or(0)
}

/// Index for a card appended to the front of the view.
pub fn next_index(cards: &[Card]) -> i64 {
    max_index(cards) + 1
}

/// Give the card with `id` an index below every other card.
pub fn put_to_end(cards: &mut [Card], id: &str) -> Result<()> {
    let index = min_index(cards) - 1;
    let card = cards
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::CardNotFound(id.to_string()))?;
    card.index = Some(index);
    Ok(())
}

/// Reassign indices to `0..n` in the current order. Does not reorder.
pub fn normalize_indices(cards: &mut [Card]) {
    for (index, card) in cards.iter_mut().enumerate() {
        card.index = Some(index as i64);
    }
}

/// Uniform Fisher–Yates shuffle, then indices `0..n` in the shuffled order.
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    for upper in (1..cards.len()).rev() {
        let pick = rng.gen_range(0..=upper);
        cards.swap(upper, pick);
    }
    normalize_indices(cards);
}

/// Number of boxes needed to show every card: one more than the highest box.
pub fn box_count(cards: &[Card]) -> u32 {
    cards.iter().map(Card::box_or_first).max().unwrap_or(0) + 1
}

/// Cards currently in `box_number` (unset counts as box 0).
pub fn cards_in_box(cards: &[Card], box_number: u32) -> impl Iterator<Item = &Card> {
    cards.iter().filter(move |c| c.box_or_first() == box_number)
}
