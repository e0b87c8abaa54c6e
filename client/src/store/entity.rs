//! The generic entity store.
//!
//! An [`EntityStore`] owns the in-memory map of one entity type and is the
//! only thing that mutates it. Writes go through the persistence adapter
//! when the connectivity oracle reports online and are applied locally
//! otherwise. On the online path the map only changes when the backend
//! echoes the write back.

use crate::bus::Channel;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::persistence::{AdapterEvent, PersistenceAdapter, Scope};
use cardbox_engine::{Entity, EntityId, Timestamp};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long an online write waits for its echo before it is applied
    /// locally. `None` returns as soon as the backend accepted the write.
    pub echo_timeout: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            echo_timeout: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        })
    }
}

/// What the echo of a write looks like.
#[derive(Debug)]
enum Expect {
    Stored { id: EntityId, at: Timestamp },
    Removed { id: EntityId },
}

#[derive(Debug)]
struct Pending {
    ticket: u64,
    expect: Expect,
    done: oneshot::Sender<()>,
}

#[derive(Debug)]
struct State<E> {
    entities: BTreeMap<EntityId, E>,
    focused: Option<EntityId>,
    pending: Vec<Pending>,
    /// Writers whose echo arrived; woken once the change is published.
    settled: Vec<oneshot::Sender<()>>,
    next_ticket: u64,
}

impl<E: Entity> State<E> {
    fn store(&mut self, entity: E) {
        let (id, at) = (entity.id().clone(), entity.modified_at());
        self.settle(|expect| {
            matches!(expect, Expect::Stored { id: wanted, at: since } if *wanted == id && at >= *since)
        });
        self.entities.insert(id, entity);
    }

    fn remove(&mut self, id: &str) {
        self.settle(|expect| matches!(expect, Expect::Removed { id: wanted } if wanted == id));
        self.entities.remove(id);
    }

    fn settle(&mut self, satisfied: impl Fn(&Expect) -> bool) {
        let (done, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| satisfied(&pending.expect));
        self.pending = waiting;
        self.settled.extend(done.into_iter().map(|pending| pending.done));
    }
}

struct Inner<E> {
    name: &'static str,
    adapter: Arc<dyn PersistenceAdapter<E>>,
    connectivity: Connectivity,
    options: StoreOptions,
    sort: fn(&mut [E]),
    state: Mutex<State<E>>,
    write_lock: tokio::sync::Mutex<()>,
    collection: Channel<Vec<E>>,
    entity: Channel<E>,
    errors: Channel<String>,
}

impl<E: Entity> Inner<E> {
    fn state(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<E> {
        let mut entities: Vec<E> = self.state().entities.values().cloned().collect();
        (self.sort)(&mut entities);
        entities
    }

    fn publish_collection(&self) {
        self.collection.publish(self.snapshot());
    }

    /// Wake the writers whose echo was applied. Runs after the publishes so
    /// the next write starts only once this change is visible.
    fn release_settled(&self) {
        let settled = std::mem::take(&mut self.state().settled);
        for done in settled {
            let _ = done.send(());
        }
    }

    fn handle(&self, event: AdapterEvent<E>) {
        match event {
            AdapterEvent::Collection(entities) => {
                {
                    let mut state = self.state();
                    for entity in entities {
                        state.store(entity);
                    }
                }
                self.publish_collection();
            }
            AdapterEvent::Entity(entity) => {
                {
                    let mut state = self.state();
                    state.focused = Some(entity.id().clone());
                    state.store(entity.clone());
                }
                self.publish_collection();
                self.entity.publish(entity);
            }
            AdapterEvent::Removed(ids) => {
                {
                    let mut state = self.state();
                    for id in &ids {
                        state.remove(id);
                    }
                }
                self.publish_collection();
            }
            AdapterEvent::Error(message) => {
                self.errors.publish(message);
            }
        }
        self.release_settled();
    }

    /// The offline path: mutate the map, then publish.
    fn apply_locally(&self, op: WriteOp, entities: &[E]) {
        {
            let mut state = self.state();
            for entity in entities {
                match op {
                    WriteOp::Create | WriteOp::Update => state.store(entity.clone()),
                    WriteOp::Delete => state.remove(entity.id()),
                }
            }
        }
        self.publish_collection();
        if op != WriteOp::Delete {
            for entity in entities {
                self.entity.publish(entity.clone());
            }
        }
        self.release_settled();
    }

    fn register_echoes(&self, op: WriteOp, entities: &[E]) -> (Vec<u64>, Vec<oneshot::Receiver<()>>) {
        let mut state = self.state();
        let mut tickets = Vec::with_capacity(entities.len());
        let mut receivers = Vec::with_capacity(entities.len());

        for entity in entities {
            let (done, receiver) = oneshot::channel();
            let id = entity.id().clone();
            let expect = match op {
                WriteOp::Delete => Expect::Removed { id },
                _ => Expect::Stored {
                    id,
                    at: entity.modified_at(),
                },
            };
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.pending.push(Pending {
                ticket,
                expect,
                done,
            });
            tickets.push(ticket);
            receivers.push(receiver);
        }
        (tickets, receivers)
    }

    fn forget(&self, tickets: &[u64]) {
        self.state()
            .pending
            .retain(|pending| !tickets.contains(&pending.ticket));
    }
}

/// In-memory store of one entity type, backed by a persistence adapter.
pub struct EntityStore<E: Entity> {
    inner: Arc<Inner<E>>,
    listener: JoinHandle<()>,
}

impl<E: Entity> EntityStore<E> {
    /// Create a store that publishes its collection sorted by `sort`.
    ///
    /// Must be called inside a Tokio runtime: the store listens to the
    /// adapter's events on a background task.
    pub fn new(
        name: &'static str,
        adapter: Arc<dyn PersistenceAdapter<E>>,
        connectivity: Connectivity,
        options: StoreOptions,
        sort: fn(&mut [E]),
    ) -> Self {
        let mut events = adapter.events();
        let inner = Arc::new(Inner {
            name,
            adapter,
            connectivity,
            options,
            sort,
            state: Mutex::new(State {
                entities: BTreeMap::new(),
                focused: None,
                pending: Vec::new(),
                settled: Vec::new(),
                next_ticket: 0,
            }),
            write_lock: tokio::sync::Mutex::new(()),
            collection: Channel::new(name),
            entity: Channel::new(name),
            errors: Channel::new(name),
        });

        let weak: Weak<Inner<E>> = Arc::downgrade(&inner);
        let listener = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(store = name, skipped, "store fell behind its adapter");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else { break };
                inner.handle(event);
            }
        });

        Self { inner, listener }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.inner.connectivity
    }

    /// Watch the collection in `scope`; results arrive on the collection
    /// channel.
    pub async fn find(&self, scope: &Scope) -> Result<()> {
        self.inner.adapter.find(scope).await
    }

    /// Read one entity; it arrives on the entity channel and becomes the
    /// focused entity.
    pub async fn find_by_id(&self, id: &str, scope: &Scope) -> Result<()> {
        self.inner.adapter.find_by_id(id, scope).await
    }

    pub async fn create(&self, entity: E) -> Result<E> {
        let mut created = self.create_many(vec![entity]).await?;
        Ok(created.remove(0))
    }

    pub async fn create_many(&self, entities: Vec<E>) -> Result<Vec<E>> {
        self.write(WriteOp::Create, entities).await
    }

    /// Refresh the modification timestamp and store the entity.
    pub async fn update(&self, entity: E) -> Result<E> {
        let mut updated = self.update_many(vec![entity]).await?;
        Ok(updated.remove(0))
    }

    pub async fn update_many(&self, entities: Vec<E>) -> Result<Vec<E>> {
        self.write(WriteOp::Update, entities).await
    }

    pub async fn delete(&self, entity: E) -> Result<()> {
        self.delete_many(vec![entity]).await
    }

    pub async fn delete_many(&self, entities: Vec<E>) -> Result<()> {
        self.write(WriteOp::Delete, entities).await.map(drop)
    }

    async fn write(&self, op: WriteOp, mut entities: Vec<E>) -> Result<Vec<E>> {
        for entity in &entities {
            entity.validate()?;
        }
        if entities.is_empty() {
            return Ok(entities);
        }

        // One write at a time: the next write starts after this one has
        // been published.
        let _guard = self.inner.write_lock.lock().await;
        if op == WriteOp::Update {
            let now = crate::clock::now();
            for entity in &mut entities {
                entity.touch(now);
            }
        }

        let store = self.inner.name;
        if !self.inner.connectivity.is_online() {
            tracing::debug!(store, %op, count = entities.len(), "offline, applying locally");
            self.inner.apply_locally(op, &entities);
            return Ok(entities);
        }

        let waiting = self
            .inner
            .options
            .echo_timeout
            .map(|timeout| (timeout, self.inner.register_echoes(op, &entities)));

        let adapter = &self.inner.adapter;
        let result = match op {
            WriteOp::Create => adapter.create_many(&entities).await,
            WriteOp::Update => adapter.update_many(&entities).await,
            WriteOp::Delete => adapter.delete_many(&entities).await,
        };
        if let Err(e) = result {
            if let Some((_, (tickets, _))) = &waiting {
                self.inner.forget(tickets);
            }
            return Err(e);
        }
        tracing::debug!(store, %op, count = entities.len(), "backend accepted write");

        if let Some((timeout, (tickets, receivers))) = waiting {
            if tokio::time::timeout(timeout, join_all(receivers)).await.is_err() {
                self.inner.forget(&tickets);
                tracing::warn!(store, %op, ?timeout, "no backend echo, applying locally");
                self.inner.apply_locally(op, &entities);
            }
        }
        Ok(entities)
    }

    /// The entity with `id`, if present.
    pub fn get(&self, id: &str) -> Option<E> {
        self.inner.state().entities.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.state().entities.contains_key(id)
    }

    /// The current view, sorted like published collections.
    pub fn snapshot(&self) -> Vec<E> {
        self.inner.snapshot()
    }

    /// The entity most recently read by [`find_by_id`](Self::find_by_id).
    pub fn focused(&self) -> Option<E> {
        let state = self.inner.state();
        state
            .focused
            .as_ref()
            .and_then(|id| state.entities.get(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every entity and publish the empty collection.
    pub fn clear(&self) {
        {
            let mut state = self.inner.state();
            state.entities.clear();
            state.focused = None;
        }
        self.inner.publish_collection();
    }

    /// Republish the current collection.
    pub fn notify(&self) {
        self.inner.publish_collection();
    }

    pub fn subscribe_collection(&self) -> broadcast::Receiver<Vec<E>> {
        self.inner.collection.subscribe()
    }

    pub fn subscribe_entity(&self) -> broadcast::Receiver<E> {
        self.inner.entity.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.inner.errors.subscribe()
    }

    /// Detach from the backend. The map keeps its last known state.
    pub fn cancel_subscription(&self) {
        self.inner.adapter.cancel_subscription();
    }
}

impl<E: Entity> Drop for EntityStore<E> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl<E: Entity> fmt::Debug for EntityStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .finish()
    }
}
