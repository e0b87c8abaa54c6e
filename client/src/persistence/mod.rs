//! Persistence adapters.
//!
//! One [`PersistenceAdapter`] per backend and entity type. Reads never return
//! data directly: results are pushed on the adapter's event channel, which
//! the owning store listens to. Writes complete once the backend accepted
//! them; the data itself comes back as an echo on the same channel.
//!
//! Variants:
//! - [`CloudAdapter`] - cloud document service over HTTP, owner-partitioned
//! - [`LocalAdapter`] - embedded SQLite database, globally scoped
//! - [`NoopAdapter`] - test double recording every call

mod cloud;
mod local;
mod noop;
mod replication;

pub use cloud::{CloudAdapter, CloudClient};
pub use local::{LocalAdapter, LocalChange, LocalDatabase};
pub use noop::{AdapterCall, NoopAdapter};
pub use replication::{Replicator, SyncReport};

use crate::bus::Channel;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cardbox_engine::{Entity, EntityId};
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Which part of a collection a read covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Owner partition; `None` reads the global scope
    pub owner: Option<String>,
}

impl Scope {
    /// The unpartitioned scope.
    pub fn global() -> Self {
        Self { owner: None }
    }

    /// Everything owned by `owner`.
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
        }
    }
}

/// Something an adapter reports to its store.
#[derive(Debug, Clone)]
pub enum AdapterEvent<E> {
    /// Current contents of the watched collection
    Collection(Vec<E>),
    /// A single entity was read
    Entity(E),
    /// Entities that left the watched collection
    Removed(Vec<EntityId>),
    /// A backend failure
    Error(String),
}

/// CRUD access to one entity collection of one backend.
#[async_trait]
pub trait PersistenceAdapter<E: Entity>: Send + Sync {
    /// Subscribe to the adapter's events.
    fn events(&self) -> broadcast::Receiver<AdapterEvent<E>>;

    /// Start watching the collection in `scope`.
    ///
    /// The current contents arrive as [`AdapterEvent::Collection`]; later
    /// changes keep arriving until [`cancel_subscription`] is called.
    ///
    /// [`cancel_subscription`]: PersistenceAdapter::cancel_subscription
    async fn find(&self, scope: &Scope) -> Result<()>;

    /// Read one entity; it arrives as [`AdapterEvent::Entity`].
    async fn find_by_id(&self, id: &str, scope: &Scope) -> Result<()>;

    async fn create(&self, entity: &E) -> Result<()> {
        self.create_many(std::slice::from_ref(entity)).await
    }

    async fn create_many(&self, entities: &[E]) -> Result<()>;

    async fn update(&self, entity: &E) -> Result<()> {
        self.update_many(std::slice::from_ref(entity)).await
    }

    async fn update_many(&self, entities: &[E]) -> Result<()>;

    async fn delete(&self, entity: &E) -> Result<()> {
        self.delete_many(std::slice::from_ref(entity)).await
    }

    async fn delete_many(&self, entities: &[E]) -> Result<()>;

    /// Stop watching. Safe to call any number of times.
    fn cancel_subscription(&self);
}

/// Log a backend failure and publish it on the adapter's error event.
pub(crate) fn report<E: Clone>(events: &Channel<AdapterEvent<E>>, error: Error) -> Error {
    tracing::error!(error = %error, "persistence backend failure");
    events.publish(AdapterEvent::Error(error.to_string()));
    error
}

/// Turns successive full reads of a collection into collection and removal
/// events.
#[derive(Debug, Default)]
pub(crate) struct CollectionDiff {
    known: HashSet<EntityId>,
}

impl CollectionDiff {
    pub(crate) fn emit<E: Entity>(&mut self, events: &Channel<AdapterEvent<E>>, entities: Vec<E>) {
        let current: HashSet<EntityId> = entities.iter().map(|e| e.id().clone()).collect();
        let removed: Vec<EntityId> = self.known.difference(&current).cloned().collect();

        events.publish(AdapterEvent::Collection(entities));
        if !removed.is_empty() {
            events.publish(AdapterEvent::Removed(removed));
        }
        self.known = current;
    }
}
