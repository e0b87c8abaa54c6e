//! Edge case tests for cardbox-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use cardbox_engine::{
    contains_display_aspect, leitner, ordering, Card, DisplayAspect, Document, Entity,
    EntityKind, Error, Filter, QuizOption, Setting, SettingKey, Side, Stack, Tag,
};
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::json;

fn card(id: &str, index: Option<i64>) -> Card {
    let mut card = Card::new(id, format!("{id} front"), format!("{id} back"), 1000);
    card.index = index;
    card
}

fn ids(cards: &[Card]) -> Vec<&str> {
    cards.iter().map(|c| c.id.as_str()).collect()
}

// ============================================================================
// Empty Collections
// ============================================================================

#[test]
fn empty_deck_arithmetic() {
    let mut cards: Vec<Card> = Vec::new();

    assert_eq!(leitner::min_index(&cards), 0);
    assert_eq!(leitner::max_index(&cards), 0);
    assert_eq!(leitner::next_index(&cards), 1);
    assert_eq!(leitner::box_count(&cards), 1);

    leitner::normalize_indices(&mut cards);
    leitner::move_all_to_first_box(&mut cards);
    leitner::shuffle(&mut cards, &mut StdRng::seed_from_u64(1));
    ordering::sort_cards(&mut cards);
    assert!(cards.is_empty());
}

#[test]
fn put_to_end_on_missing_card() {
    let mut cards = vec![card("a", Some(0))];
    assert_eq!(
        leitner::put_to_end(&mut cards, "ghost"),
        Err(Error::CardNotFound("ghost".into()))
    );
    assert_eq!(cards[0].index, Some(0));
}

#[test]
fn single_card_shuffle() {
    let mut cards = vec![card("only", Some(42))];
    leitner::shuffle(&mut cards, &mut StdRng::seed_from_u64(9));
    assert_eq!(ids(&cards), ["only"]);
    assert_eq!(cards[0].index, Some(0));
}

// ============================================================================
// Index Edge Cases
// ============================================================================

#[test]
fn put_to_end_without_indices() {
    let mut cards = vec![card("a", None), card("b", None)];
    leitner::put_to_end(&mut cards, "b").unwrap();

    assert_eq!(cards[0].index, None);
    assert_eq!(cards[1].index, Some(-1));
}

#[test]
fn put_to_end_twice_keeps_descending() {
    let mut cards = vec![card("a", Some(2)), card("b", Some(1)), card("c", Some(0))];
    leitner::put_to_end(&mut cards, "a").unwrap();
    leitner::put_to_end(&mut cards, "b").unwrap();
    ordering::sort_cards(&mut cards);

    assert_eq!(ids(&cards), ["c", "a", "b"]);
}

#[test]
fn negative_indices_sort_below_zero() {
    let mut cards = vec![card("low", Some(-5)), card("zero", Some(0)), card("high", Some(3))];
    ordering::sort_cards(&mut cards);
    assert_eq!(ids(&cards), ["high", "zero", "low"]);
}

#[test]
fn unindexed_cards_hold_their_slots() {
    let mut cards = vec![
        card("a", Some(1)),
        card("loose", None),
        card("b", Some(5)),
        card("c", Some(3)),
    ];
    ordering::sort_cards(&mut cards);
    assert_eq!(ids(&cards), ["b", "loose", "c", "a"]);
}

#[test]
fn equal_indices_keep_relative_order() {
    let mut cards = vec![card("first", Some(1)), card("second", Some(1)), card("top", Some(2))];
    ordering::sort_cards(&mut cards);
    assert_eq!(ids(&cards), ["top", "first", "second"]);
}

// ============================================================================
// Box Edge Cases
// ============================================================================

#[test]
fn box_saturates_at_maximum() {
    let mut card = card("a", None);
    card.box_number = Some(u32::MAX);
    leitner::move_to_next_box(&mut card);
    assert_eq!(card.box_number, Some(u32::MAX));
}

#[test]
fn unset_box_counts_as_first() {
    let mut cards = vec![card("a", None), card("b", None)];
    cards[1].box_number = Some(0);

    assert_eq!(leitner::cards_in_box(&cards, 0).count(), 2);
    assert_eq!(leitner::box_count(&cards), 1);

    leitner::move_to_next_box(&mut cards[0]);
    leitner::move_to_next_box(&mut cards[0]);
    assert_eq!(leitner::box_count(&cards), 3);
    assert_eq!(leitner::cards_in_box(&cards, 1).count(), 0);
}

#[test]
fn reset_sets_explicit_zero() {
    let mut cards = vec![card("a", None), card("b", None)];
    cards[1].box_number = Some(7);
    leitner::move_all_to_first_box(&mut cards);
    assert!(cards.iter().all(|c| c.box_number == Some(0)));
}

// ============================================================================
// Filter Edge Cases
// ============================================================================

#[test]
fn whitespace_search_is_inactive() {
    let filter = Filter {
        search: "   ".into(),
        ..Filter::default()
    };
    assert!(!filter.is_active());
    assert!(filter.matches_card(&card("a", None)));
}

#[test]
fn unicode_search_ignores_case() {
    let apple = Card::new("a", "ÄPFEL", "apples", 1000);
    let filter = Filter {
        search: "äpf".into(),
        ..Filter::default()
    };
    assert!(filter.matches_card(&apple));
}

#[test]
fn search_reaches_examples_and_quiz_options() {
    let mut quiz = Card::new("q", "la casa", "the house", 1000);
    quiz.sides[0].examples.push("Mi casa es tu casa".into());
    quiz.sides[1].quiz_options = vec![
        QuizOption::new("dwelling", true),
        QuizOption::new("garden", false),
    ];

    let by_example = Filter {
        search: "TU CASA".into(),
        ..Filter::default()
    };
    let by_option = Filter {
        search: "garden".into(),
        ..Filter::default()
    };
    assert!(by_example.matches_card(&quiz));
    assert!(by_option.matches_card(&quiz));
}

#[test]
fn any_selected_tag_is_enough() {
    let tagged = card("a", None).with_tags(["verbs"]);
    let filter = Filter {
        tag_ids: ["nouns", "verbs"].into_iter().map(String::from).collect(),
        ..Filter::default()
    };
    assert!(filter.matches_card(&tagged));
    assert!(!filter.matches_card(&card("b", None)));
}

#[test]
fn favorites_flag_ignores_stacks() {
    let filter = Filter {
        favorites_only: true,
        ..Filter::default()
    };
    assert!(filter.matches_stack(&Stack::new("s", "Spanish", 1)));
    assert!(!filter.matches_card(&card("a", None)));
}

#[test]
fn stack_search_covers_languages() {
    let mut stack = Stack::new("s", "Vocabulary", 1);
    stack.target_language = Some("Portuguese".into());
    let filter = Filter {
        search: "portu".into(),
        ..Filter::default()
    };
    assert!(filter.matches_stack(&stack));
}

// ============================================================================
// Display Aspect Edge Cases
// ============================================================================

#[test]
fn blank_front_cannot_be_created() {
    let blank = Card::new("", "   ", "back", 1000);
    assert!(!contains_display_aspect(DisplayAspect::CanBeCreated, &blank));
    assert!(!contains_display_aspect(DisplayAspect::CanBeUpdated, &blank));
}

#[test]
fn quiz_needs_two_options() {
    let mut card = card("a", None);
    card.sides[0].quiz_options = vec![QuizOption::new("lonely", true)];
    assert!(!contains_display_aspect(DisplayAspect::SingleChoiceQuiz, &card));

    card.sides[0].quiz_options.push(QuizOption::new("also right", true));
    assert!(!contains_display_aspect(DisplayAspect::SingleChoiceQuiz, &card));
    assert!(contains_display_aspect(DisplayAspect::MultipleChoiceQuiz, &card));
}

#[test]
fn cards_with_many_sides() {
    let sides = (0..5).map(|i| Side::titled(format!("side {i}"))).collect();
    let card = Card::with_sides("many", sides, 1000);
    assert!(card.validate().is_ok());
    assert_eq!(card.back().map(|s| s.title.as_str()), Some("side 1"));
}

// ============================================================================
// Document Edge Cases
// ============================================================================

#[test]
fn unknown_kind_is_rejected() {
    let raw = json!({
        "id": "x",
        "kind": "deck",
        "body": {},
        "updatedAt": 1
    });
    assert!(serde_json::from_value::<Document>(raw).is_err());
    assert_eq!(EntityKind::parse("deck"), None);
}

#[test]
fn wrong_kind_does_not_decode() {
    let document = Document::from_entity(&Tag::new("t", "verbs", 1)).unwrap();
    assert_eq!(
        document.to_entity::<Stack>(),
        Err(Error::KindMismatch {
            expected: EntityKind::Stack,
            actual: EntityKind::Tag,
        })
    );
}

#[test]
fn malformed_body_names_the_document() {
    let mut document = Document::from_entity(&Stack::new("s1", "Spanish", 1)).unwrap();
    document.body = json!({"title": 42});
    match document.to_entity::<Stack>() {
        Err(Error::InvalidBody { id, .. }) => assert_eq!(id, "s1"),
        other => panic!("expected InvalidBody, got {other:?}"),
    }
}

#[test]
fn tombstone_keeps_the_body() {
    let stack = Stack::new("s1", "Spanish", 1).with_owner("user-1");
    let tombstone = Document::tombstone(&stack, 99).unwrap();

    assert!(!tombstone.is_active());
    assert_eq!(tombstone.updated_at, 99);
    assert_eq!(tombstone.owner.as_deref(), Some("user-1"));
    assert_eq!(tombstone.to_entity::<Stack>().unwrap(), stack);
}

// ============================================================================
// Settings Edge Cases
// ============================================================================

#[test]
fn unknown_setting_key() {
    let err = "theme".parse::<SettingKey>().unwrap_err();
    assert_eq!(err, Error::UnknownSettingKey("theme".into()));
}

#[test]
fn setting_identity_is_its_key() {
    for key in SettingKey::ALL {
        let setting = Setting::default_for(key, 1);
        assert_eq!(setting.id, key.as_str());
        assert_eq!(setting.value, "");
        assert_eq!(key.as_str().parse::<SettingKey>(), Ok(key));
    }
}

// ============================================================================
// ID Edge Cases
// ============================================================================

#[test]
fn empty_ids_are_invalid_arguments() {
    let stack = Stack::new("", "untitled", 1);
    let tag = Tag::new("", "untitled", 1);

    assert!(stack.validate().unwrap_err().is_invalid_argument());
    assert!(tag.validate().unwrap_err().is_invalid_argument());
}

#[test]
fn special_character_ids() {
    let mut stack = Stack::new("stack/with:odd chars", "Odd", 1);
    stack.push_card(card("card with spaces", Some(0)));
    stack.push_card(card("日本語", Some(1)));

    assert!(stack.card("日本語").is_some());
    assert!(stack.remove_card("card with spaces").is_some());
    assert!(!stack.replace_card(card("missing", None)));
    assert_eq!(stack.cards.len(), 1);
}

// ============================================================================
// Properties
// ============================================================================

fn deck() -> impl Strategy<Value = Vec<Card>> {
    proptest::collection::vec(proptest::option::of(-500i64..500), 0..40).prop_map(|indices| {
        indices
            .into_iter()
            .enumerate()
            .map(|(i, index)| card(&format!("card-{i}"), index))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_put_to_end_lands_last(mut cards in deck(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!cards.is_empty());
        let id = cards[pick.index(cards.len())].id.clone();

        leitner::put_to_end(&mut cards, &id).unwrap();
        ordering::sort_cards(&mut cards);

        let last_indexed = cards.iter().rev().find(|c| c.index.is_some()).unwrap();
        prop_assert_eq!(&last_indexed.id, &id);
    }

    #[test]
    fn prop_shuffle_is_a_permutation(mut cards in deck(), seed in any::<u64>()) {
        let mut before: Vec<String> = cards.iter().map(|c| c.id.clone()).collect();
        leitner::shuffle(&mut cards, &mut StdRng::seed_from_u64(seed));

        let mut after: Vec<String> = cards.iter().map(|c| c.id.clone()).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
        for (position, card) in cards.iter().enumerate() {
            prop_assert_eq!(card.index, Some(position as i64));
        }
    }

    #[test]
    fn prop_filtered_cards_keep_order(cards in deck(), search in "[a-z0-9 ]{0,4}") {
        let filter = Filter { search, ..Filter::default() };
        let kept = filter.apply_to_cards(&cards);

        let mut remaining = cards.iter();
        for card in &kept {
            prop_assert!(remaining.any(|c| c.id == card.id));
        }
    }
}
