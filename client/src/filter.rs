//! The filter engine.
//!
//! Holds the search text, the tag selection and the favorites flag. Every
//! setter publishes once on the filter channel; the message has no payload,
//! subscribers read the current [`Filter`] back.

use crate::bus::Channel;
use crate::store::CardsStore;
use cardbox_engine::{Card, EntityId, Filter, Stack, Tag};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

#[derive(Debug)]
struct FilterInner {
    filter: Mutex<Filter>,
    changes: Channel<()>,
}

/// Shared filter state. Clones observe the same filter.
#[derive(Debug, Clone)]
pub struct FilterService {
    inner: Arc<FilterInner>,
}

impl FilterService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FilterInner {
                filter: Mutex::new(Filter::default()),
                changes: Channel::new("filter"),
            }),
        }
    }

    fn filter_mut(&self) -> MutexGuard<'_, Filter> {
        self.inner.filter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the filter, then publish once.
    fn change(&self, f: impl FnOnce(&mut Filter)) {
        f(&mut self.filter_mut());
        self.inner.changes.publish(());
    }

    /// The current filter.
    pub fn current(&self) -> Filter {
        self.filter_mut().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.changes.subscribe()
    }

    //
    // Search
    //

    pub fn update_search(&self, search: impl Into<String>) {
        let search = search.into();
        self.change(|filter| filter.search = search);
    }

    pub fn clear_search(&self) {
        self.change(|filter| filter.search.clear());
    }

    //
    // Tags
    //

    /// Add tags to the selection.
    pub fn update_tags(&self, tags: &[Tag]) {
        self.change(|filter| filter.tag_ids.extend(tags.iter().map(|t| t.id.clone())));
    }

    /// Add tags to the selection, but only if a selection already exists.
    pub fn update_tags_if_not_empty(&self, tags: &[Tag]) {
        if !self.filter_mut().tag_ids.is_empty() {
            self.update_tags(tags);
        }
    }

    pub fn select_tag(&self, id: impl Into<EntityId>) {
        let id = id.into();
        self.change(|filter| {
            filter.tag_ids.insert(id);
        });
    }

    pub fn deselect_tag(&self, id: &str) {
        self.change(|filter| {
            filter.tag_ids.remove(id);
        });
    }

    pub fn clear_tags(&self) {
        self.change(|filter| filter.tag_ids.clear());
    }

    //
    // Favorites
    //

    pub fn set_favorites(&self, favorites_only: bool) {
        self.change(|filter| filter.favorites_only = favorites_only);
    }

    /// Reset all three inputs with a single publish.
    pub fn clear_all_filters(&self) {
        self.change(|filter| *filter = Filter::default());
    }

    //
    // Views
    //

    pub fn filter_cards(&self, cards: &[Card]) -> Vec<Card> {
        self.current().apply_to_cards(cards)
    }

    pub fn filter_stacks(&self, stacks: &[Stack]) -> Vec<Stack> {
        self.current().apply_to_stacks(stacks)
    }

    /// Keep a filtered copy of the card view up to date.
    ///
    /// The view recomputes whenever the filter or the cards change.
    pub fn watch_cards(&self, cards: &CardsStore) -> FilteredCards {
        let mut card_changes = cards.subscribe();
        let mut filter_changes = self.subscribe();
        let mut current = cards.cards();
        let service = self.clone();
        let output: Channel<Vec<Card>> = Channel::new("filtered-cards");
        let publisher = output.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = card_changes.recv() => match received {
                        Ok(cards) => current = cards,
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    received = filter_changes.recv() => match received {
                        Ok(()) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    },
                }
                publisher.publish(service.filter_cards(&current));
            }
        });

        FilteredCards { output, task }
    }
}

impl Default for FilterService {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered card view maintained by a background task.
#[derive(Debug)]
pub struct FilteredCards {
    output: Channel<Vec<Card>>,
    task: JoinHandle<()>,
}

impl FilteredCards {
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Card>> {
        self.output.subscribe()
    }
}

impl Drop for FilteredCards {
    fn drop(&mut self) {
        self.task.abort();
    }
}
