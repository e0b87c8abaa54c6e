//! Queries on the documents table.

use cardbox_engine::{Document, EntityKind, Sequence};
use sqlx::{PgPool, Row};

/// A stored document row.
#[derive(Debug)]
pub struct StoredDocument {
    pub id: String,
    pub kind: String,
    pub owner: Option<String>,
    pub body: serde_json::Value,
    pub deleted: bool,
    pub updated_at: i64,
    pub seq: i64,
    #[allow(dead_code)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            owner: row.try_get("owner")?,
            body: row.try_get("body")?,
            deleted: row.try_get("deleted")?,
            updated_at: row.try_get("updated_at")?,
            seq: row.try_get("seq")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredDocument {
    /// Convert to the wire envelope; `None` for an unknown kind.
    pub fn to_document(&self) -> Option<Document> {
        let kind = EntityKind::parse(&self.kind)?;
        Some(Document {
            id: self.id.clone(),
            kind,
            owner: self.owner.clone(),
            body: self.body.clone(),
            deleted: self.deleted,
            updated_at: self.updated_at.max(0) as u64,
            seq: self.seq.max(0) as u64,
        })
    }
}

fn into_documents(rows: Vec<StoredDocument>) -> Vec<Document> {
    rows.iter()
        .filter_map(|row| {
            let document = row.to_document();
            if document.is_none() {
                tracing::warn!(id = %row.id, kind = %row.kind, "skipping document of unknown kind");
            }
            document
        })
        .collect()
}

/// Upsert documents in one transaction, each getting a fresh sequence.
///
/// Writers of the same database are serialized by a transaction-scoped
/// advisory lock, so sequences become visible in the order they are
/// assigned and a reader that advanced past a sequence never misses a
/// lower one committed later.
///
/// Returns the highest sequence assigned.
pub async fn upsert_documents(
    pool: &PgPool,
    database: &str,
    documents: &[Document],
) -> Result<Sequence, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(database)
        .execute(&mut *tx)
        .await?;
    let mut last_seq: i64 = 0;

    for document in documents {
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO documents (database, id, kind, owner, body, deleted, updated_at, seq)
            VALUES ($1, $2, $3, $4, $5, $6, $7, nextval('document_seq'))
            ON CONFLICT (database, id) DO UPDATE SET
                kind = EXCLUDED.kind,
                owner = EXCLUDED.owner,
                body = EXCLUDED.body,
                deleted = EXCLUDED.deleted,
                updated_at = EXCLUDED.updated_at,
                seq = nextval('document_seq')
            RETURNING seq
            "#,
        )
        .bind(database)
        .bind(&document.id)
        .bind(document.kind.as_str())
        .bind(&document.owner)
        .bind(&document.body)
        .bind(document.deleted)
        .bind(document.updated_at as i64)
        .fetch_one(&mut *tx)
        .await?;

        last_seq = last_seq.max(seq);
    }

    tx.commit().await?;
    Ok(last_seq.max(0) as Sequence)
}

/// Active documents, optionally restricted by kind and owner.
pub async fn list_documents(
    pool: &PgPool,
    database: &str,
    kind: Option<EntityKind>,
    owner: Option<&str>,
) -> Result<Vec<Document>, sqlx::Error> {
    let rows: Vec<StoredDocument> = sqlx::query_as(
        r#"
        SELECT id, kind, owner, body, deleted, updated_at, seq, created_at
        FROM documents
        WHERE database = $1
          AND NOT deleted
          AND ($2::TEXT IS NULL OR kind = $2)
          AND ($3::TEXT IS NULL OR owner = $3)
        ORDER BY seq ASC
        "#,
    )
    .bind(database)
    .bind(kind.map(|k| k.as_str()))
    .bind(owner)
    .fetch_all(pool)
    .await?;

    Ok(into_documents(rows))
}

/// A single active document.
pub async fn get_document(
    pool: &PgPool,
    database: &str,
    id: &str,
) -> Result<Option<Document>, sqlx::Error> {
    let row: Option<StoredDocument> = sqlx::query_as(
        r#"
        SELECT id, kind, owner, body, deleted, updated_at, seq, created_at
        FROM documents
        WHERE database = $1 AND id = $2 AND NOT deleted
        "#,
    )
    .bind(database)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|row| row.to_document()))
}

/// One page of the change feed.
#[derive(Debug)]
pub struct ChangePage {
    pub documents: Vec<Document>,
    /// Sequence of the last row read, skipped rows included
    pub last_seq: Option<Sequence>,
    /// More rows follow this page
    pub has_more: bool,
}

/// Up to `limit` documents (tombstones included) changed after `since`, in
/// sequence order.
pub async fn documents_since(
    pool: &PgPool,
    database: &str,
    since: Sequence,
    limit: i64,
) -> Result<ChangePage, sqlx::Error> {
    // Fetch one more than requested to check if there are more
    let mut rows: Vec<StoredDocument> = sqlx::query_as(
        r#"
        SELECT id, kind, owner, body, deleted, updated_at, seq, created_at
        FROM documents
        WHERE database = $1 AND seq > $2
        ORDER BY seq ASC
        LIMIT $3
        "#,
    )
    .bind(database)
    .bind(since as i64)
    .bind(limit + 1)
    .fetch_all(pool)
    .await?;

    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit.max(0) as usize);

    Ok(ChangePage {
        has_more,
        last_seq: rows.last().map(|row| row.seq.max(0) as Sequence),
        documents: into_documents(rows),
    })
}

/// Highest sequence of a database, 0 when empty.
pub async fn last_sequence(pool: &PgPool, database: &str) -> Result<Sequence, sqlx::Error> {
    let (seq,): (i64,) =
        sqlx::query_as("SELECT COALESCE(MAX(seq), 0)::BIGINT FROM documents WHERE database = $1")
            .bind(database)
            .fetch_one(pool)
            .await?;
    Ok(seq.max(0) as Sequence)
}
