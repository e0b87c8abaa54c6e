//! Entity stores.
//!
//! - [`EntityStore`] - the generic store with the online/offline write path
//! - [`StacksStore`] - stacks plus the tags they reference
//! - [`TagsStore`] - tags
//! - [`CardsStore`] - the cards of the stack in focus and the Leitner
//!   operations on them

mod cards;
mod entity;
mod stacks;
mod tags;

pub use cards::CardsStore;
pub use entity::{EntityStore, StoreOptions};
pub use stacks::StacksStore;
pub use tags::TagsStore;
