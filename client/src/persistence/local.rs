//! Local-embedded persistence on SQLite.
//!
//! Every logical database (entities, settings) is a partition of one
//! `documents` table. Committed writes are announced on an in-process change
//! feed; adapter subscriptions re-read their collection from it, which is
//! how local writes echo back to the stores.

use super::{report, AdapterEvent, CollectionDiff, PersistenceAdapter, Scope};
use crate::bus::Channel;
use crate::clock;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cardbox_engine::{Document, Entity, EntityId, EntityKind, Sequence};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Documents of one kind were written to a local database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChange {
    pub kind: EntityKind,
    pub ids: Vec<EntityId>,
}

/// Handle to one logical database inside the local SQLite file.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
    name: String,
    changes: Channel<LocalChange>,
}

impl LocalDatabase {
    /// Open (or create) the SQLite file at `path` and run migrations.
    pub async fn open(path: &str, name: impl Into<String>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let name = name.into();
        tracing::info!(path, database = %name, "opened local database");
        Ok(Self {
            pool,
            name,
            changes: Channel::new("local-changes"),
        })
    }

    /// Another logical database in the same file, with its own change feed.
    pub fn attach(&self, name: impl Into<String>) -> Self {
        Self {
            pool: self.pool.clone(),
            name: name.into(),
            changes: Channel::new("local-changes"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to committed writes.
    pub fn changes(&self) -> broadcast::Receiver<LocalChange> {
        self.changes.subscribe()
    }

    /// Active documents of one kind.
    pub async fn read_all(&self, kind: EntityKind) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, owner, body, deleted, updated_at, remote_seq
            FROM documents
            WHERE database = ? AND kind = ? AND deleted = 0
            ORDER BY id
            "#,
        )
        .bind(&self.name)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows_to_documents(rows)
    }

    /// A single document, tombstones included.
    pub async fn read(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, owner, body, deleted, updated_at, remote_seq
            FROM documents
            WHERE database = ? AND id = ?
            "#,
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_document(&row),
            None => Ok(None),
        }
    }

    /// Upsert documents in one transaction and announce them.
    ///
    /// `dirty` marks local writes that still have to be pushed. Clean
    /// (replicated) writes never overwrite a dirty row that is newer.
    pub async fn write(&self, documents: &[Document], dirty: bool) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut changed: BTreeMap<EntityKind, Vec<EntityId>> = BTreeMap::new();

        for document in documents {
            let result = sqlx::query(
                r#"
                INSERT INTO documents
                    (database, id, kind, owner, body, deleted, updated_at, remote_seq, dirty)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (database, id) DO UPDATE SET
                    kind = excluded.kind,
                    owner = excluded.owner,
                    body = excluded.body,
                    deleted = excluded.deleted,
                    updated_at = excluded.updated_at,
                    remote_seq = MAX(documents.remote_seq, excluded.remote_seq),
                    dirty = excluded.dirty
                WHERE excluded.dirty = 1
                   OR documents.dirty = 0
                   OR excluded.updated_at > documents.updated_at
                "#,
            )
            .bind(&self.name)
            .bind(&document.id)
            .bind(document.kind.as_str())
            .bind(&document.owner)
            .bind(serde_json::to_string(&document.body)?)
            .bind(document.deleted)
            .bind(document.updated_at as i64)
            .bind(document.seq as i64)
            .bind(dirty)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                changed
                    .entry(document.kind)
                    .or_default()
                    .push(document.id.clone());
            }
        }

        tx.commit().await?;

        let written = changed.values().map(Vec::len).sum();
        for (kind, ids) in changed {
            self.changes.publish(LocalChange { kind, ids });
        }
        Ok(written)
    }

    /// Local writes not yet pushed, tombstones included.
    pub async fn dirty(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, owner, body, deleted, updated_at, remote_seq
            FROM documents
            WHERE database = ? AND dirty = 1
            ORDER BY updated_at
            "#,
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        rows_to_documents(rows)
    }

    /// Clear the dirty flag of pushed documents that were not modified since.
    pub async fn mark_pushed(&self, documents: &[Document]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for document in documents {
            sqlx::query(
                "UPDATE documents SET dirty = 0 WHERE database = ? AND id = ? AND updated_at = ?",
            )
            .bind(&self.name)
            .bind(&document.id)
            .bind(document.updated_at as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Last remote sequence pulled into this database.
    pub async fn checkpoint(&self) -> Result<Sequence> {
        let seq: Option<i64> =
            sqlx::query_scalar("SELECT last_seq FROM checkpoints WHERE database = ?")
                .bind(&self.name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(seq.unwrap_or(0).max(0) as Sequence)
    }

    pub async fn set_checkpoint(&self, seq: Sequence) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (database, last_seq) VALUES (?, ?)
            ON CONFLICT (database) DO UPDATE SET last_seq = excluded.last_seq
            "#,
        )
        .bind(&self.name)
        .bind(seq as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn rows_to_documents(rows: Vec<SqliteRow>) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(document) = row_to_document(&row)? {
            documents.push(document);
        }
    }
    Ok(documents)
}

fn row_to_document(row: &SqliteRow) -> Result<Option<Document>> {
    let kind: String = row.try_get("kind")?;
    let Some(kind) = EntityKind::parse(&kind) else {
        tracing::warn!(kind = %kind, "skipping document of unknown kind");
        return Ok(None);
    };
    let body: String = row.try_get("body")?;

    Ok(Some(Document {
        id: row.try_get("id")?,
        kind,
        owner: row.try_get("owner")?,
        body: serde_json::from_str(&body)?,
        deleted: row.try_get("deleted")?,
        updated_at: row.try_get::<i64, _>("updated_at")?.max(0) as u64,
        seq: row.try_get::<i64, _>("remote_seq")?.max(0) as u64,
    }))
}

/// Typed entities of one kind from documents; broken bodies are skipped.
fn decode<E: Entity>(documents: &[Document]) -> Vec<E> {
    documents
        .iter()
        .filter_map(|document| match document.to_entity::<E>() {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(id = %document.id, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

/// Adapter over one entity kind of a [`LocalDatabase`].
///
/// The local database is globally scoped: the owner of a [`Scope`] is
/// ignored on reads.
pub struct LocalAdapter<E> {
    database: LocalDatabase,
    events: Channel<AdapterEvent<E>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> LocalAdapter<E> {
    pub fn new(database: LocalDatabase) -> Self {
        Self {
            database,
            events: Channel::new("local-adapter"),
            subscription: Mutex::new(None),
            _kind: PhantomData,
        }
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.database
    }

    async fn write(&self, entities: &[E]) -> Result<()> {
        let documents = entities
            .iter()
            .map(Document::from_entity)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.database
            .write(&documents, true)
            .await
            .map(drop)
            .map_err(|e| report(&self.events, e))
    }
}

#[async_trait]
impl<E: Entity> PersistenceAdapter<E> for LocalAdapter<E> {
    fn events(&self) -> broadcast::Receiver<AdapterEvent<E>> {
        self.events.subscribe()
    }

    async fn find(&self, scope: &Scope) -> Result<()> {
        self.cancel_subscription();
        tracing::debug!(
            database = %self.database.name(),
            kind = %E::KIND,
            owner = ?scope.owner,
            "watching local collection"
        );

        // Subscribe before the first read so no write slips in between.
        let mut changes = self.database.changes();
        let documents = self
            .database
            .read_all(E::KIND)
            .await
            .map_err(|e| report(&self.events, e))?;

        let mut diff = CollectionDiff::default();
        diff.emit(&self.events, decode(&documents));

        let database = self.database.clone();
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) if change.kind != E::KIND => continue,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                match database.read_all(E::KIND).await {
                    Ok(documents) => diff.emit(&events, decode(&documents)),
                    Err(e) => {
                        report(&events, e);
                    }
                }
            }
        });

        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    async fn find_by_id(&self, id: &str, _scope: &Scope) -> Result<()> {
        let document = self
            .database
            .read(id)
            .await
            .map_err(|e| report(&self.events, e))?;

        match document {
            Some(document) if document.is_active() && document.kind == E::KIND => {
                let entity = document.to_entity::<E>()?;
                self.events.publish(AdapterEvent::Entity(entity));
                Ok(())
            }
            _ => Err(Error::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            }),
        }
    }

    async fn create_many(&self, entities: &[E]) -> Result<()> {
        self.write(entities).await
    }

    async fn update_many(&self, entities: &[E]) -> Result<()> {
        self.write(entities).await
    }

    async fn delete_many(&self, entities: &[E]) -> Result<()> {
        let now = clock::now();
        let tombstones = entities
            .iter()
            .map(|entity| Document::tombstone(entity, now.max(entity.modified_at())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.database
            .write(&tombstones, true)
            .await
            .map(drop)
            .map_err(|e| report(&self.events, e))
    }

    fn cancel_subscription(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!(database = %self.database.name(), kind = %E::KIND, "local subscription cancelled");
        }
    }
}

impl<E> Drop for LocalAdapter<E> {
    fn drop(&mut self) {
        let handle = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
