//! Document collection routes.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_changes, handle_get, handle_list, handle_put, ChangesQuery, ListQuery,
};
use crate::AppState;
use cardbox_engine::{Changes, Document, PutDocuments, PutResult};

/// Create document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{database}/documents",
            get(list_handler).put(put_handler),
        )
        .route("/{database}/documents/{id}", get(get_handler))
        .route("/{database}/changes", get(changes_handler))
}

/// GET /{database}/documents - Active documents.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(database): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Document>>> {
    Ok(Json(handle_list(&state.pool, &database, query).await?))
}

/// GET /{database}/documents/{id} - One document.
async fn get_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((database, id)): Path<(String, String)>,
) -> Result<Json<Document>> {
    Ok(Json(handle_get(&state.pool, &database, &id).await?))
}

/// PUT /{database}/documents - Store documents.
async fn put_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(database): Path<String>,
    Json(request): Json<PutDocuments>,
) -> Result<Json<PutResult>> {
    Ok(Json(handle_put(&state.pool, &database, request).await?))
}

/// GET /{database}/changes - Change feed.
async fn changes_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(database): Path<String>,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<Changes>> {
    Ok(Json(handle_changes(&state.pool, &database, query).await?))
}
