//! Document collection handlers.
//!
//! Writes are last-write-wins: every accepted document replaces the stored
//! one and gets a fresh change sequence.

use crate::db;
use crate::error::{AppError, Result};
use cardbox_engine::{
    Card, Changes, Document, Entity, EntityKind, PutDocuments, PutResult, Sequence, Setting, Stack,
    Tag,
};
use serde::Deserialize;
use sqlx::PgPool;

/// Default page size for the change feed.
const DEFAULT_LIMIT: i64 = 100;

/// Maximum page size for the change feed.
const MAX_LIMIT: i64 = 1000;

/// Query parameters for listing documents.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
    pub owner: Option<String>,
}

/// Query parameters for the change feed.
#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    /// Last sequence the caller has seen
    pub since: Option<Sequence>,
    /// Maximum number of documents to return
    pub limit: Option<i64>,
}

/// Database names become part of every key; keep them simple.
pub fn validate_database(database: &str) -> Result<()> {
    let valid = !database.is_empty()
        && database
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "invalid database name: {database:?}"
        )))
    }
}

fn validate_as<E: Entity>(document: &Document) -> std::result::Result<(), cardbox_engine::Error> {
    let entity: E = document.to_entity()?;
    if entity.id() != &document.id {
        return Err(cardbox_engine::Error::InvalidBody {
            id: document.id.clone(),
            reason: format!("body identifies {}", entity.id()),
        });
    }
    entity.validate()
}

/// A document must carry a valid entity of its declared kind.
pub fn validate_document(document: &Document) -> Result<()> {
    match document.kind {
        EntityKind::Stack => validate_as::<Stack>(document),
        EntityKind::Card => validate_as::<Card>(document),
        EntityKind::Tag => validate_as::<Tag>(document),
        EntityKind::Setting => validate_as::<Setting>(document),
    }?;
    Ok(())
}

/// List active documents.
pub async fn handle_list(pool: &PgPool, database: &str, query: ListQuery) -> Result<Vec<Document>> {
    validate_database(database)?;
    let kind = query
        .kind
        .as_deref()
        .map(|kind| {
            EntityKind::parse(kind)
                .ok_or_else(|| AppError::BadRequest(format!("unknown kind: {kind}")))
        })
        .transpose()?;

    Ok(db::list_documents(pool, database, kind, query.owner.as_deref()).await?)
}

/// Fetch one active document.
pub async fn handle_get(pool: &PgPool, database: &str, id: &str) -> Result<Document> {
    validate_database(database)?;
    db::get_document(pool, database, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document {id}")))
}

/// Store documents.
pub async fn handle_put(pool: &PgPool, database: &str, request: PutDocuments) -> Result<PutResult> {
    validate_database(database)?;
    for document in &request.documents {
        validate_document(document)?;
    }

    if request.documents.is_empty() {
        return Ok(PutResult {
            accepted: 0,
            last_seq: db::last_sequence(pool, database).await?,
        });
    }

    let last_seq = db::upsert_documents(pool, database, &request.documents).await?;
    tracing::debug!(
        database,
        accepted = request.documents.len(),
        last_seq,
        "documents stored"
    );

    Ok(PutResult {
        accepted: request.documents.len(),
        last_seq,
    })
}

/// Serve the change feed.
pub async fn handle_changes(pool: &PgPool, database: &str, query: ChangesQuery) -> Result<Changes> {
    validate_database(database)?;
    let since = query.since.unwrap_or(0);
    let limit = query
        .limit
        .map(|l| l.clamp(1, MAX_LIMIT))
        .unwrap_or(DEFAULT_LIMIT);

    let page = db::documents_since(pool, database, since, limit).await?;

    Ok(Changes {
        documents: page.documents,
        last_seq: page.last_seq.unwrap_or(since),
        has_more: page.has_more,
    })
}
