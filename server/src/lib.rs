//! # Cardbox Server
//!
//! The cloud document service behind Cardbox clients: owner-partitioned
//! document collections with a sequence-numbered change feed, stored in
//! PostgreSQL.
//!
//! ## Endpoints
//!
//! - `GET /health` - liveness
//! - `GET /{database}/documents?kind=&owner=` - active documents
//! - `GET /{database}/documents/{id}` - one document
//! - `PUT /{database}/documents` - store documents, last write wins
//! - `GET /{database}/changes?since=&limit=` - change feed

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::config::Config;
use crate::db::Pool;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
