//! Push-pull replication of a local database with the cloud service.

use super::{CloudClient, LocalDatabase};
use crate::bus::Channel;
use crate::error::Result;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Documents requested per pull page.
const PULL_BATCH: usize = 100;

/// Outcome of one replication round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local documents pushed to the remote
    pub pushed: usize,
    /// Remote documents applied locally
    pub pulled: usize,
}

/// Continuous replication of one logical database.
///
/// There is no automatic retry: the first failure ends the task and is
/// published on the error channel.
#[derive(Debug, Clone)]
pub struct Replicator {
    local: LocalDatabase,
    remote: CloudClient,
    interval: Duration,
    errors: Channel<String>,
}

impl Replicator {
    pub fn new(
        local: LocalDatabase,
        remote: CloudClient,
        interval: Duration,
        errors: Channel<String>,
    ) -> Self {
        Self {
            local,
            remote,
            interval,
            errors,
        }
    }

    /// Push dirty local documents, then pull remote changes.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let dirty = self.local.dirty().await?;
        if !dirty.is_empty() {
            let result = self.remote.put(dirty.clone()).await?;
            self.local.mark_pushed(&dirty).await?;
            report.pushed = result.accepted;
        }

        let mut since = self.local.checkpoint().await?;
        loop {
            let changes = self.remote.changes(since, PULL_BATCH).await?;
            if !changes.documents.is_empty() {
                report.pulled += self.local.write(&changes.documents, false).await?;
            }
            if changes.last_seq <= since {
                break;
            }
            since = changes.last_seq;
            self.local.set_checkpoint(since).await?;
            if !changes.has_more {
                break;
            }
        }

        Ok(report)
    }

    /// Replicate every interval until the first failure.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(database = %self.local.name(), "replication started");
            loop {
                match self.run_once().await {
                    Ok(report) if report != SyncReport::default() => {
                        tracing::debug!(
                            database = %self.local.name(),
                            pushed = report.pushed,
                            pulled = report.pulled,
                            "replicated"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(database = %self.local.name(), error = %e, "replication stopped");
                        self.errors
                            .publish(format!("replication of {} failed: {e}", self.local.name()));
                        break;
                    }
                }
                tokio::time::sleep(self.interval).await;
            }
        })
    }
}
