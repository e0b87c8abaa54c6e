//! Stacks store.
//!
//! Wraps the generic store and keeps the tags a stack references fresh:
//! every stack create or update also updates those tags. Tag updates are a
//! separate write on the tags store; their failures never fail the stack
//! write.

use super::{EntityStore, StoreOptions, TagsStore};
use crate::clock;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::persistence::{PersistenceAdapter, Scope};
use cardbox_engine::{ordering, Stack};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct StacksStore {
    stacks: EntityStore<Stack>,
    tags: Arc<TagsStore>,
}

impl StacksStore {
    pub fn new(
        adapter: Arc<dyn PersistenceAdapter<Stack>>,
        tags: Arc<TagsStore>,
        connectivity: Connectivity,
        options: StoreOptions,
    ) -> Self {
        Self {
            stacks: EntityStore::new(
                "stacks",
                adapter,
                connectivity,
                options,
                ordering::sort_by_recency::<Stack>,
            ),
            tags,
        }
    }

    pub fn tags(&self) -> &Arc<TagsStore> {
        &self.tags
    }

    pub async fn find(&self, scope: &Scope) -> Result<()> {
        self.stacks.find(scope).await
    }

    pub async fn find_by_id(&self, id: &str, scope: &Scope) -> Result<()> {
        self.stacks.find_by_id(id, scope).await
    }

    pub async fn create(&self, stack: Stack) -> Result<Stack> {
        let stack = self.stacks.create(stack).await?;
        self.update_related_tags(std::slice::from_ref(&stack)).await;
        Ok(stack)
    }

    pub async fn create_many(&self, stacks: Vec<Stack>) -> Result<Vec<Stack>> {
        let stacks = self.stacks.create_many(stacks).await?;
        self.update_related_tags(&stacks).await;
        Ok(stacks)
    }

    pub async fn update(&self, stack: Stack) -> Result<Stack> {
        let stack = self.stacks.update(stack).await?;
        self.update_related_tags(std::slice::from_ref(&stack)).await;
        Ok(stack)
    }

    pub async fn update_many(&self, stacks: Vec<Stack>) -> Result<Vec<Stack>> {
        let stacks = self.stacks.update_many(stacks).await?;
        self.update_related_tags(&stacks).await;
        Ok(stacks)
    }

    pub async fn delete(&self, stack: Stack) -> Result<()> {
        self.stacks.delete(stack).await
    }

    pub async fn delete_many(&self, stacks: Vec<Stack>) -> Result<()> {
        self.stacks.delete_many(stacks).await
    }

    /// Store a copy of `stack` under a fresh identifier owned by `owner`.
    pub async fn upload(&self, stack: &Stack, owner: &str) -> Result<Stack> {
        let now = clock::now();
        let mut copy = stack.clone();
        copy.id = clock::new_id();
        copy.owner = Some(owner.to_string());
        copy.created_at = now;
        copy.modified_at = now;

        tracing::info!(from = %stack.id, to = %copy.id, owner, "uploading stack");
        self.create(copy).await
    }

    async fn update_related_tags(&self, stacks: &[Stack]) {
        for stack in stacks {
            for tag in self.tags.tags_by_ids(&stack.tag_ids) {
                if let Err(e) = self.tags.update(tag).await {
                    tracing::error!(stack = %stack.id, error = %e, "failed to update related tag");
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Stack> {
        self.stacks.get(id)
    }

    pub fn snapshot(&self) -> Vec<Stack> {
        self.stacks.snapshot()
    }

    pub fn focused(&self) -> Option<Stack> {
        self.stacks.focused()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn clear(&self) {
        self.stacks.clear();
    }

    pub fn notify(&self) {
        self.stacks.notify();
    }

    pub fn subscribe_collection(&self) -> broadcast::Receiver<Vec<Stack>> {
        self.stacks.subscribe_collection()
    }

    pub fn subscribe_entity(&self) -> broadcast::Receiver<Stack> {
        self.stacks.subscribe_entity()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.stacks.subscribe_errors()
    }

    pub fn cancel_subscription(&self) {
        self.stacks.cancel_subscription();
    }
}
