//! The application context.
//!
//! Owns the connectivity oracle, the stores, the settings service and the
//! filter engine, and wires them to the persistence backend selected by
//! configuration. Everything that would otherwise be a process-wide
//! singleton hangs off this struct.

use crate::bus::Channel;
use crate::config::{Config, ConfigError, PersistenceMode};
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::filter::FilterService;
use crate::persistence::{
    CloudAdapter, CloudClient, LocalAdapter, LocalDatabase, PersistenceAdapter, Replicator, Scope,
};
use crate::settings::SettingsService;
use crate::store::{CardsStore, StacksStore, StoreOptions, TagsStore};
use cardbox_engine::{Setting, Stack, Tag};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// One adapter per entity collection.
pub struct Adapters {
    pub stacks: Arc<dyn PersistenceAdapter<Stack>>,
    pub tags: Arc<dyn PersistenceAdapter<Tag>>,
    pub settings: Arc<dyn PersistenceAdapter<Setting>>,
}

/// The two local logical databases in local mode.
#[derive(Debug, Clone)]
struct LocalDatabases {
    entities: LocalDatabase,
    settings: LocalDatabase,
}

pub struct AppContext {
    config: Config,
    connectivity: Connectivity,
    tags: Arc<TagsStore>,
    stacks: Arc<StacksStore>,
    cards: CardsStore,
    settings: SettingsService,
    filter: FilterService,
    local: Option<LocalDatabases>,
    sync_errors: Channel<String>,
    replication: Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    /// Open the backend selected by `config` and build the stores on it.
    pub async fn connect(config: Config, connectivity: Connectivity) -> Result<Self> {
        match config.persistence_mode {
            PersistenceMode::Local => {
                let entities = LocalDatabase::open(
                    &config.local_database_path,
                    config.entities_database.clone(),
                )
                .await?;
                let settings = entities.attach(config.settings_database.clone());

                let adapters = Adapters {
                    stacks: Arc::new(LocalAdapter::<Stack>::new(entities.clone())),
                    tags: Arc::new(LocalAdapter::<Tag>::new(entities.clone())),
                    settings: Arc::new(LocalAdapter::<Setting>::new(settings.clone())),
                };
                let mut context = Self::with_adapters(config, connectivity, adapters);
                context.local = Some(LocalDatabases { entities, settings });
                Ok(context)
            }
            PersistenceMode::Cloud => {
                let url = config
                    .cloud_url
                    .clone()
                    .ok_or(ConfigError::MissingCloudUrl)?;
                let token = config.auth_token.clone();
                let entities =
                    CloudClient::new(&url, config.entities_database.clone(), token.clone());
                let settings = CloudClient::new(&url, config.settings_database.clone(), token);
                let owner = config.owner_id.clone();
                let poll = config.poll_interval;

                let adapters = Adapters {
                    stacks: Arc::new(CloudAdapter::<Stack>::new(entities.clone(), owner.clone(), poll)),
                    tags: Arc::new(CloudAdapter::<Tag>::new(entities, owner.clone(), poll)),
                    settings: Arc::new(CloudAdapter::<Setting>::new(settings, owner, poll)),
                };
                tracing::info!(url = %url, "using cloud persistence");
                Ok(Self::with_adapters(config, connectivity, adapters))
            }
        }
    }

    /// Build the stores on explicit adapters.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_adapters(config: Config, connectivity: Connectivity, adapters: Adapters) -> Self {
        let options = StoreOptions {
            echo_timeout: config.echo_timeout,
        };
        let tags = Arc::new(TagsStore::tags(adapters.tags, connectivity.clone(), options));
        let stacks = Arc::new(StacksStore::new(
            adapters.stacks,
            Arc::clone(&tags),
            connectivity.clone(),
            options,
        ));
        let cards = CardsStore::new(Arc::clone(&stacks));
        let settings = SettingsService::new(adapters.settings, connectivity.clone(), options);

        Self {
            config,
            connectivity,
            tags,
            stacks,
            cards,
            settings,
            filter: FilterService::new(),
            local: None,
            sync_errors: Channel::new("sync-errors"),
            replication: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn stacks(&self) -> &Arc<StacksStore> {
        &self.stacks
    }

    pub fn tags(&self) -> &Arc<TagsStore> {
        &self.tags
    }

    pub fn cards(&self) -> &CardsStore {
        &self.cards
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn filter(&self) -> &FilterService {
        &self.filter
    }

    /// The read scope of this context: the owner in cloud mode, global in
    /// local mode.
    pub fn scope(&self) -> Scope {
        match (&self.config.persistence_mode, &self.config.owner_id) {
            (PersistenceMode::Cloud, Some(owner)) => Scope::owner(owner.clone()),
            _ => Scope::global(),
        }
    }

    /// Start continuous replication of both local databases.
    ///
    /// Returns the number of replication tasks started. Nothing is started
    /// in cloud mode or without a sync URL.
    pub fn start_sync(&self) -> usize {
        let (Some(local), Some(url)) = (&self.local, &self.config.sync_url) else {
            tracing::info!("replication disabled");
            return 0;
        };

        let token = self.config.auth_token.clone();
        let mut handles = self
            .replication
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() {
            return handles.len();
        }
        for database in [&local.entities, &local.settings] {
            let remote = CloudClient::new(url, database.name().to_string(), token.clone());
            let replicator = Replicator::new(
                database.clone(),
                remote,
                self.config.sync_interval,
                self.sync_errors.clone(),
            );
            handles.push(replicator.spawn());
        }
        handles.len()
    }

    /// Replication failures.
    pub fn subscribe_sync_errors(&self) -> broadcast::Receiver<String> {
        self.sync_errors.subscribe()
    }

    /// Detach every store from its backend and stop replication.
    pub async fn shutdown(&self) {
        self.stacks.cancel_subscription();
        self.tags.cancel_subscription();
        self.settings.cancel_subscription();

        let handles: Vec<_> = self
            .replication
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
        }

        if let Some(local) = &self.local {
            local.entities.close().await;
        }
        tracing::info!("context shut down");
    }
}
