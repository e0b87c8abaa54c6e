//! Health check endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness))
        .route("/", get(root))
}

/// Liveness: the process is serving requests.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness: the database answers.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let status = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "database not ready");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        status.0,
        Json(HealthResponse {
            status: status.1,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn root() -> &'static str {
    "Cardbox Document Service"
}
