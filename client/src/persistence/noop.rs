//! A persistence adapter that talks to no backend.
//!
//! It records every call so tests can assert which operations reached the
//! backend boundary. Optionally it echoes writes back like a real backend
//! would, or fails them.

use super::{report, AdapterEvent, PersistenceAdapter, Scope};
use crate::bus::Channel;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cardbox_engine::{Entity, EntityId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// A call that reached the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Find(Scope),
    FindById(EntityId),
    Create(Vec<EntityId>),
    Update(Vec<EntityId>),
    Delete(Vec<EntityId>),
    CancelSubscription,
}

#[derive(Debug)]
struct NoopState<E> {
    calls: Vec<AdapterCall>,
    stored: BTreeMap<EntityId, E>,
    failure: Option<String>,
}

/// Adapter without a backend.
#[derive(Debug)]
pub struct NoopAdapter<E> {
    events: Channel<AdapterEvent<E>>,
    echo: bool,
    state: Mutex<NoopState<E>>,
}

impl<E: Entity> NoopAdapter<E> {
    /// Accepts every write and never emits anything.
    pub fn new() -> Self {
        Self {
            events: Channel::new("noop-adapter"),
            echo: false,
            state: Mutex::new(NoopState {
                calls: Vec::new(),
                stored: BTreeMap::new(),
                failure: None,
            }),
        }
    }

    /// Keeps written entities and echoes the collection after every write.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    /// Make every following call fail with a backend error.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state().failure = Some(message.into());
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.state().calls.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    fn state(&self) -> MutexGuard<'_, NoopState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: AdapterCall) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failure.clone() {
            Some(message) => {
                drop(state);
                Err(report(
                    &self.events,
                    Error::Backend {
                        status: 503,
                        message,
                    },
                ))
            }
            None => Ok(()),
        }
    }

    fn write(&self, entities: &[E], remove: bool) {
        if !self.echo {
            return;
        }
        let collection: Vec<E> = {
            let mut state = self.state();
            for entity in entities {
                if remove {
                    state.stored.remove(entity.id());
                } else {
                    state.stored.insert(entity.id().clone(), entity.clone());
                }
            }
            state.stored.values().cloned().collect()
        };

        if remove {
            self.events.publish(AdapterEvent::Removed(
                entities.iter().map(|e| e.id().clone()).collect(),
            ));
        } else {
            self.events.publish(AdapterEvent::Collection(collection));
        }
    }
}

impl<E: Entity> Default for NoopAdapter<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn ids<E: Entity>(entities: &[E]) -> Vec<EntityId> {
    entities.iter().map(|e| e.id().clone()).collect()
}

#[async_trait]
impl<E: Entity> PersistenceAdapter<E> for NoopAdapter<E> {
    fn events(&self) -> broadcast::Receiver<AdapterEvent<E>> {
        self.events.subscribe()
    }

    async fn find(&self, scope: &Scope) -> Result<()> {
        self.record(AdapterCall::Find(scope.clone()))?;
        if self.echo {
            let collection = self.state().stored.values().cloned().collect();
            self.events.publish(AdapterEvent::Collection(collection));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str, _scope: &Scope) -> Result<()> {
        self.record(AdapterCall::FindById(id.to_string()))?;
        let found = self.state().stored.get(id).cloned();
        if let Some(entity) = found {
            self.events.publish(AdapterEvent::Entity(entity));
        }
        Ok(())
    }

    async fn create_many(&self, entities: &[E]) -> Result<()> {
        self.record(AdapterCall::Create(ids(entities)))?;
        self.write(entities, false);
        Ok(())
    }

    async fn update_many(&self, entities: &[E]) -> Result<()> {
        self.record(AdapterCall::Update(ids(entities)))?;
        self.write(entities, false);
        Ok(())
    }

    async fn delete_many(&self, entities: &[E]) -> Result<()> {
        self.record(AdapterCall::Delete(ids(entities)))?;
        self.write(entities, true);
        Ok(())
    }

    fn cancel_subscription(&self) {
        self.state().calls.push(AdapterCall::CancelSubscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbox_engine::Tag;

    #[tokio::test]
    async fn records_calls_without_events() {
        let adapter: NoopAdapter<Tag> = NoopAdapter::new();
        let mut events = adapter.events();

        adapter.create(&Tag::new("t1", "a", 1)).await.unwrap();
        adapter.cancel_subscription();
        adapter.cancel_subscription();

        assert_eq!(
            adapter.calls(),
            vec![
                AdapterCall::Create(vec!["t1".into()]),
                AdapterCall::CancelSubscription,
                AdapterCall::CancelSubscription,
            ]
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn echoing_publishes_collection() {
        let adapter: NoopAdapter<Tag> = NoopAdapter::echoing();
        let mut events = adapter.events();

        adapter.create(&Tag::new("t1", "a", 1)).await.unwrap();
        match events.try_recv().unwrap() {
            AdapterEvent::Collection(tags) => assert_eq!(tags[0].id, "t1"),
            other => panic!("unexpected {other:?}"),
        }

        adapter.delete(&Tag::new("t1", "a", 1)).await.unwrap();
        assert!(matches!(events.try_recv().unwrap(), AdapterEvent::Removed(_)));
    }

    #[tokio::test]
    async fn failure_is_reported() {
        let adapter: NoopAdapter<Tag> = NoopAdapter::new();
        let mut events = adapter.events();
        adapter.fail_with("unavailable");

        let result = adapter.update(&Tag::new("t1", "a", 1)).await;
        assert!(matches!(result, Err(Error::Backend { status: 503, .. })));
        assert!(matches!(events.try_recv().unwrap(), AdapterEvent::Error(_)));
    }
}
