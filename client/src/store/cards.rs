//! Cards store.
//!
//! Cards live inside their stack, so this store has no adapter of its own:
//! it keeps the stack in focus, runs the Leitner operations on a copy of
//! its cards and persists the result as one stack update. It follows the
//! stacks store so that backend echoes of the focused stack refresh the
//! card view.

use super::StacksStore;
use crate::bus::Channel;
use crate::clock;
use crate::error::{Error, Result};
use cardbox_engine::{leitner, ordering, Card, Entity, EntityId, Stack};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct CardsState {
    stack: Option<Stack>,
    cards: Vec<Card>,
    vice_versa: bool,
}

struct CardsInner {
    stacks: Arc<StacksStore>,
    state: Mutex<CardsState>,
    write_lock: tokio::sync::Mutex<()>,
    cards: Channel<Vec<Card>>,
}

impl CardsInner {
    fn state(&self) -> MutexGuard<'_, CardsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn view(&self) -> Vec<Card> {
        let mut cards = self.state().cards.clone();
        ordering::sort_cards(&mut cards);
        cards
    }

    fn notify(&self) {
        self.cards.publish(self.view());
    }

    /// Focus `stack` and show its cards.
    fn adopt(&self, stack: Stack) {
        {
            let mut state = self.state();
            state.cards = stack.cards.clone();
            state.stack = Some(stack);
        }
        self.notify();
    }

    /// Adopt a stack from the stacks store if it is the focused one and
    /// newer than what we hold.
    fn follow(&self, stack: &Stack) {
        let newer = matches!(
            &self.state().stack,
            Some(current) if current.id == stack.id && stack.modified_at > current.modified_at
        );
        if newer {
            tracing::debug!(stack = %stack.id, "focused stack refreshed");
            self.adopt(stack.clone());
        }
    }
}

fn card_of(stack: &Stack, id: &str) -> Result<Card> {
    stack
        .card(id)
        .cloned()
        .ok_or_else(|| cardbox_engine::Error::CardNotFound(id.to_string()).into())
}

/// The cards of the stack in focus.
pub struct CardsStore {
    inner: Arc<CardsInner>,
    follower: JoinHandle<()>,
}

impl CardsStore {
    /// Must be called inside a Tokio runtime.
    pub fn new(stacks: Arc<StacksStore>) -> Self {
        let mut entities = stacks.subscribe_entity();
        let mut collections = stacks.subscribe_collection();
        let inner = Arc::new(CardsInner {
            stacks,
            state: Mutex::new(CardsState::default()),
            write_lock: tokio::sync::Mutex::new(()),
            cards: Channel::new("cards"),
        });

        let weak: Weak<CardsInner> = Arc::downgrade(&inner);
        let follower = tokio::spawn(async move {
            loop {
                let stacks = tokio::select! {
                    received = entities.recv() => match received {
                        Ok(stack) => vec![stack],
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    received = collections.recv() => match received {
                        Ok(stacks) => stacks,
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                };
                let Some(inner) = weak.upgrade() else { break };
                for stack in &stacks {
                    inner.follow(stack);
                }
            }
        });

        Self { inner, follower }
    }

    //
    // Focus
    //

    /// Put `stack` in focus and show its cards.
    pub fn initialize_stack(&self, stack: Stack) {
        self.inner.adopt(stack);
    }

    /// Replace the card view without persisting anything.
    pub fn initialize_cards(&self, cards: Vec<Card>) {
        self.inner.state().cards = cards;
        self.inner.notify();
    }

    /// Empty the card view.
    pub fn clear_cards(&self) {
        self.inner.state().cards.clear();
        self.inner.notify();
    }

    pub fn stack(&self) -> Option<Stack> {
        self.inner.state().stack.clone()
    }

    /// The current card view, highest index first.
    pub fn cards(&self) -> Vec<Card> {
        self.inner.view()
    }

    pub fn card(&self, id: &str) -> Option<Card> {
        self.inner.state().cards.iter().find(|c| c.id == id).cloned()
    }

    //
    // Persistence
    //

    /// Apply `change` to a copy of the focused stack and persist it.
    async fn modify<F>(&self, change: F) -> Result<Stack>
    where
        F: FnOnce(&mut Stack) -> Result<()>,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut stack = self.inner.state().stack.clone().ok_or(Error::NoStackInFocus)?;
        change(&mut stack)?;
        self.persist(stack).await
    }

    /// Write the stack through the stacks store and show what that store
    /// now holds. While the store still waits for the backend echo (no echo
    /// timeout) the view is left alone and `follow` adopts the echo.
    async fn persist(&self, stack: Stack) -> Result<Stack> {
        let persisted = self.inner.stacks.update(stack).await?;
        if let Some(stored) = self.inner.stacks.get(&persisted.id) {
            if stored.modified_at >= persisted.modified_at {
                self.inner.adopt(stored);
            }
        }
        Ok(persisted)
    }

    /// Persist the stack as given and focus it.
    pub async fn update_stack(&self, stack: Stack) -> Result<Stack> {
        let _guard = self.inner.write_lock.lock().await;
        let id = stack.id.clone();
        let known = self
            .inner
            .stacks
            .get(&id)
            .unwrap_or_else(|| stack.clone());
        let persisted = self.persist(stack).await?;

        let focused_elsewhere = self
            .inner
            .state()
            .stack
            .as_ref()
            .map_or(true, |current| current.id != id);
        if focused_elsewhere {
            self.inner.adopt(known);
        }
        Ok(persisted)
    }

    /// Add a card in front of every other card of the focused stack.
    pub async fn create(&self, mut card: Card) -> Result<Card> {
        card.validate()?;
        let id = card.id.clone();
        let stack = self
            .modify(move |stack| {
                card.index = Some(leitner::next_index(&stack.cards));
                stack.push_card(card);
                Ok(())
            })
            .await?;
        card_of(&stack, &id)
    }

    /// Replace a card of the focused stack, refreshing its modification
    /// timestamp.
    pub async fn update(&self, mut card: Card) -> Result<Card> {
        card.validate()?;
        card.touch(clock::now());
        let updated = card.clone();
        self.modify(move |stack| {
            let id = card.id.clone();
            if stack.replace_card(card) {
                Ok(())
            } else {
                Err(cardbox_engine::Error::CardNotFound(id).into())
            }
        })
        .await?;
        Ok(updated)
    }

    pub async fn delete(&self, card: &Card) -> Result<()> {
        card.validate()?;
        self.modify(|stack| {
            stack
                .remove_card(&card.id)
                .map(drop)
                .ok_or_else(|| cardbox_engine::Error::CardNotFound(card.id.clone()).into())
        })
        .await
        .map(drop)
    }

    /// Change one card of the focused stack under the write lock, so
    /// overlapping calls each see the previous call's result.
    async fn modify_card<F>(&self, id: &str, change: F) -> Result<Card>
    where
        F: FnOnce(&mut Vec<Card>) -> Result<()>,
    {
        let now = clock::now();
        let stack = self
            .modify(|stack| {
                change(&mut stack.cards)?;
                stack
                    .card_mut(id)
                    .ok_or_else(|| cardbox_engine::Error::CardNotFound(id.to_string()))?
                    .touch(now);
                Ok(())
            })
            .await?;
        card_of(&stack, id)
    }

    //
    // Leitner
    //

    /// Give a card an index below every other card.
    pub async fn put_to_end(&self, id: &str) -> Result<Card> {
        self.modify_card(id, |cards| Ok(leitner::put_to_end(cards, id)?))
            .await
    }

    /// Advance a card by one box.
    pub async fn move_to_next_box(&self, id: &str) -> Result<Card> {
        self.modify_card(id, |cards| {
            if let Some(card) = cards.iter_mut().find(|c| c.id == id) {
                leitner::move_to_next_box(card);
            }
            Ok(())
        })
        .await
    }

    /// Reset every card of the focused stack to box 0 in one stack update.
    pub async fn move_all_to_first_box(&self) -> Result<Stack> {
        self.modify(|stack| {
            leitner::move_all_to_first_box(&mut stack.cards);
            Ok(())
        })
        .await
    }

    /// Compact the indices of the focused stack to `0..n` in stack order.
    pub async fn normalize_indices(&self) -> Result<Stack> {
        self.modify(|stack| {
            leitner::normalize_indices(&mut stack.cards);
            Ok(())
        })
        .await
    }

    /// Shuffle the focused stack and persist the new order.
    pub async fn shuffle(&self) -> Result<Stack> {
        let _guard = self.inner.write_lock.lock().await;
        let mut stack = self.inner.state().stack.clone().ok_or(Error::NoStackInFocus)?;
        leitner::shuffle(&mut stack.cards, &mut rand::thread_rng());
        self.persist(stack).await
    }

    /// [`shuffle`](Self::shuffle) with a caller-provided random source.
    pub async fn shuffle_with<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> Result<Stack> {
        self.modify(|stack| {
            leitner::shuffle(&mut stack.cards, rng);
            Ok(())
        })
        .await
    }

    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<Card> {
        self.modify_card(id, |cards| {
            if let Some(card) = cards.iter_mut().find(|c| c.id == id) {
                card.favorite = favorite;
            }
            Ok(())
        })
        .await
    }

    //
    // Presentation
    //

    /// Flip every card. Returns the new state.
    pub fn toggle_vice_versa(&self) -> bool {
        let mut state = self.inner.state();
        state.vice_versa = !state.vice_versa;
        state.vice_versa
    }

    pub fn vice_versa(&self) -> bool {
        self.inner.state().vice_versa
    }

    //
    // Lookup
    //

    /// Boxes needed to show the current cards.
    pub fn box_count(&self) -> u32 {
        leitner::box_count(&self.inner.state().cards)
    }

    /// Whether any of `cards` references the tag.
    pub fn tag_is_contained_in_cards(cards: &[Card], tag_id: &str) -> bool {
        let tag_ids: BTreeSet<&EntityId> = cards.iter().flat_map(|c| &c.tag_ids).collect();
        tag_ids.iter().any(|id| id.as_str() == tag_id)
    }

    //
    // Notification
    //

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Card>> {
        self.inner.cards.subscribe()
    }

    /// Republish the current view.
    pub fn notify(&self) {
        self.inner.notify();
    }
}

impl Drop for CardsStore {
    fn drop(&mut self) {
        self.follower.abort();
    }
}
