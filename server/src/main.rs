//! Cardbox Server - cloud document service for Cardbox clients.

use cardbox_server::config::Config;
use cardbox_server::{app, db, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardbox_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Cardbox Server on {}", config.bind_address());

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    if config.auth_secret.is_none() {
        tracing::warn!("AUTH_SECRET not set, accepting anonymous requests");
    }

    let addr = config.bind_address();
    let state = AppState {
        pool,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
