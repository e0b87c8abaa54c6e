//! Cardbox sync host.
//!
//! Opens the configured backend, loads settings and watches every
//! collection, replicating the local database when a sync URL is set. Runs
//! until interrupted.

use cardbox_client::{AppContext, Config, Connectivity};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardbox_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::info!(mode = %config.persistence_mode, "starting cardbox");

    let context = AppContext::connect(config, Connectivity::online()).await?;
    let settings = context.settings().load().await?;
    tracing::info!(count = settings.len(), "settings loaded");

    let scope = context.scope();
    context.tags().find(&scope).await?;
    context.stacks().find(&scope).await?;
    let replicating = context.start_sync();

    let mut stacks = context.stacks().subscribe_collection();
    let mut errors = context.stacks().subscribe_errors();
    let mut sync_errors = context.subscribe_sync_errors();
    tracing::info!(replicating, "ready");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(stacks) = stacks.recv() => {
                let cards: usize = stacks.iter().map(|s| s.cards.len()).sum();
                tracing::info!(stacks = stacks.len(), cards, "collection changed");
            }
            Ok(message) = errors.recv() => {
                tracing::error!(%message, "store error");
            }
            Ok(message) = sync_errors.recv() => {
                tracing::error!(%message, "replication error");
            }
        }
    }

    context.shutdown().await;
    Ok(())
}
