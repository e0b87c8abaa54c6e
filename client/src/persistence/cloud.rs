//! Cloud document service persistence over HTTP.
//!
//! Collections are partitioned by owner. The service has no push channel,
//! so a live subscription re-reads the owner's collection after every write
//! this adapter completes and on a fixed poll interval.

use super::{report, AdapterEvent, CollectionDiff, PersistenceAdapter, Scope};
use crate::bus::Channel;
use crate::clock;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cardbox_engine::{Changes, Document, Entity, EntityKind, PutDocuments, PutResult, Sequence};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

/// HTTP client for one database of the cloud document service.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    token: Option<String>,
}

impl CloudClient {
    pub fn new(base_url: &str, database: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.into(),
            token,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.database, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Backend {
            status: status.as_u16(),
            message,
        })
    }

    /// Active documents of one kind, optionally restricted to an owner.
    pub async fn list(&self, kind: EntityKind, owner: Option<&str>) -> Result<Vec<Document>> {
        let mut query = vec![("kind", kind.as_str())];
        if let Some(owner) = owner {
            query.push(("owner", owner));
        }

        let request = self.http.get(self.url("documents")).query(&query);
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    /// A single document; `None` when the service does not know it.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let request = self.http.get(self.url(&format!("documents/{id}")));
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json().await?))
    }

    /// Upsert documents (tombstones included).
    pub async fn put(&self, documents: Vec<Document>) -> Result<PutResult> {
        let request = self
            .http
            .put(self.url("documents"))
            .json(&PutDocuments { documents });
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Documents changed after `since`, in sequence order.
    pub async fn changes(&self, since: Sequence, limit: usize) -> Result<Changes> {
        let request = self
            .http
            .get(self.url("changes"))
            .query(&[("since", since.to_string()), ("limit", limit.to_string())]);
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Adapter over one entity kind of the cloud document service.
pub struct CloudAdapter<E> {
    client: CloudClient,
    owner: Option<String>,
    poll_interval: Duration,
    events: Channel<AdapterEvent<E>>,
    refresh: Arc<Notify>,
    subscription: Mutex<Option<JoinHandle<()>>>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> CloudAdapter<E> {
    /// Documents written without an owner are filed under `owner`.
    pub fn new(client: CloudClient, owner: Option<String>, poll_interval: Duration) -> Self {
        Self {
            client,
            owner,
            poll_interval,
            events: Channel::new("cloud-adapter"),
            refresh: Arc::new(Notify::new()),
            subscription: Mutex::new(None),
            _kind: PhantomData,
        }
    }

    fn document(&self, entity: &E) -> Result<Document> {
        let mut document = Document::from_entity(entity)?;
        if document.owner.is_none() {
            document.owner = self.owner.clone();
        }
        Ok(document)
    }

    async fn put(&self, documents: Vec<Document>) -> Result<()> {
        let result = self
            .client
            .put(documents)
            .await
            .map_err(|e| report(&self.events, e))?;
        tracing::debug!(
            database = %self.client.database(),
            accepted = result.accepted,
            last_seq = result.last_seq,
            "documents stored"
        );
        self.refresh.notify_one();
        Ok(())
    }

    async fn write(&self, entities: &[E]) -> Result<()> {
        let documents = entities
            .iter()
            .map(|entity| self.document(entity))
            .collect::<Result<Vec<_>>>()?;
        self.put(documents).await
    }
}

async fn read_collection<E: Entity>(client: &CloudClient, owner: Option<&str>) -> Result<Vec<E>> {
    let documents = client.list(E::KIND, owner).await?;
    Ok(documents
        .iter()
        .filter_map(|document| match document.to_entity::<E>() {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(id = %document.id, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect())
}

#[async_trait]
impl<E: Entity> PersistenceAdapter<E> for CloudAdapter<E> {
    fn events(&self) -> broadcast::Receiver<AdapterEvent<E>> {
        self.events.subscribe()
    }

    async fn find(&self, scope: &Scope) -> Result<()> {
        self.cancel_subscription();

        let owner = scope.owner.clone().or_else(|| self.owner.clone());
        let entities = read_collection::<E>(&self.client, owner.as_deref())
            .await
            .map_err(|e| report(&self.events, e))?;

        let mut diff = CollectionDiff::default();
        diff.emit(&self.events, entities);

        let client = self.client.clone();
        let events = self.events.clone();
        let refresh = Arc::clone(&self.refresh);
        let poll_interval = self.poll_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = refresh.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                match read_collection::<E>(&client, owner.as_deref()).await {
                    Ok(entities) => diff.emit(&events, entities),
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
        tracing::debug!(database = %self.client.database(), kind = %E::KIND, "watching cloud collection");
        Ok(())
    }

    async fn find_by_id(&self, id: &str, _scope: &Scope) -> Result<()> {
        let document = self
            .client
            .get(id)
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
        let mut tombstones = Vec::with_capacity(entities.len());
        for entity in entities {
            let mut document = Document::tombstone(entity, now.max(entity.modified_at()))?;
            if document.owner.is_none() {
                document.owner = self.owner.clone();
            }
            tombstones.push(document);
        }
        self.put(tombstones).await
    }

    fn cancel_subscription(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!(database = %self.client.database(), kind = %E::KIND, "cloud subscription cancelled");
        }
    }
}

impl<E> Drop for CloudAdapter<E> {
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
