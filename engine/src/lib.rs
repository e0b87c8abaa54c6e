//! # Cardbox Engine
//!
//! The entity model and the Leitner scheduling logic of Cardbox, a flashcard
//! study tool that keeps cards in stacks and moves them through
//! spaced-repetition boxes.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of databases, network, or platform
//! - **Deterministic**: Timestamps and randomness are passed in by the caller
//! - **Testable**: Pure functions over plain data
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! Everything that is persisted implements [`Entity`]:
//! - [`Stack`] - a named collection of cards, owned by a user
//! - [`Card`] - two or more [`Side`]s, a Leitner box and an ordering index
//! - [`Tag`] - a shared label referenced by id
//! - [`Setting`] - a value for an enumerated [`SettingKey`]
//!
//! Backends store entities wrapped in a [`Document`].
//!
//! ### Leitner Scheduling
//!
//! The [`leitner`] module moves cards between boxes and maintains their
//! ordering indices (put to end, normalize, shuffle).
//!
//! ### Views
//!
//! [`ordering`] defines the order of published collections and [`Filter`]
//! narrows them by search text, tags and favorites.
//!
//! ## Quick Start
//!
//! ```rust
//! use cardbox_engine::{leitner, Card, Stack};
//!
//! let mut stack = Stack::new("stack-1", "Spanish", 1706745600000);
//! stack.push_card(Card::new("card-1", "el perro", "the dog", 1706745600000));
//! stack.push_card(Card::new("card-2", "el gato", "the cat", 1706745600000));
//! leitner::normalize_indices(&mut stack.cards);
//!
//! leitner::move_to_next_box(&mut stack.cards[0]);
//! assert_eq!(stack.cards[0].box_number, Some(1));
//! assert_eq!(leitner::box_count(&stack.cards), 2);
//!
//! leitner::put_to_end(&mut stack.cards, "card-2").unwrap();
//! assert_eq!(stack.cards[1].index, Some(-1));
//! ```

pub mod card;
pub mod display;
pub mod document;
pub mod entity;
pub mod error;
pub mod filter;
pub mod leitner;
pub mod ordering;
pub mod protocol;
pub mod setting;
pub mod stack;
pub mod tag;

// Re-export main types at crate root
pub use card::{Card, QuizOption, Side, Tense};
pub use display::{contains_display_aspect, DisplayAspect};
pub use document::{Document, Sequence};
pub use entity::{Entity, EntityKind};
pub use error::Error;
pub use filter::Filter;
pub use protocol::{Changes, PutDocuments, PutResult};
pub use setting::{Setting, SettingKey};
pub use stack::Stack;
pub use tag::Tag;

/// Type aliases for clarity
pub type EntityId = String;
pub type Timestamp = u64;
