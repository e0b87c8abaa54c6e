//! Display-aspect predicates over cards.

use crate::Card;
use serde::{Deserialize, Serialize};

/// A content aspect the presentation layer may render for a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayAspect {
    CanBeCreated,
    CanBeUpdated,
    Titles,
    Tenses,
    Examples,
    Information,
    SingleChoiceQuiz,
    MultipleChoiceQuiz,
}

/// Whether `card` has content for `aspect`.
pub fn contains_display_aspect(aspect: DisplayAspect, card: &Card) -> bool {
    match aspect {
        DisplayAspect::CanBeCreated => has_front_title(card),
        DisplayAspect::CanBeUpdated => !card.id.is_empty() && has_front_title(card),
        DisplayAspect::Titles => card.sides.iter().any(|s| !s.title.trim().is_empty()),
        DisplayAspect::Tenses => card.sides.iter().any(|s| !s.tenses.is_empty()),
        DisplayAspect::Examples => card.sides.iter().any(|s| !s.examples.is_empty()),
        DisplayAspect::Information => card
            .sides
            .iter()
            .any(|s| !s.information.trim().is_empty()),
        DisplayAspect::SingleChoiceQuiz => quiz_correct_counts(card).any(|c| c == 1),
        DisplayAspect::MultipleChoiceQuiz => quiz_correct_counts(card).any(|c| c > 1),
    }
}

fn has_front_title(card: &Card) -> bool {
    card.front().is_some_and(|s| !s.title.trim().is_empty())
}

// Number of correct options of every side that holds a quiz (2+ options).
fn quiz_correct_counts(card: &Card) -> impl Iterator<Item = usize> + '_ {
    card.sides
        .iter()
        .filter(|s| s.quiz_options.len() >= 2)
        .map(|s| s.quiz_options.iter().filter(|o| o.correct).count())
}
