//! Settings.
//!
//! A key/value surface over the settings database. On the first load every
//! recognized key missing from storage is created with an empty value;
//! later loads never create defaults again.

use crate::clock;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::persistence::{PersistenceAdapter, Scope};
use crate::store::{EntityStore, StoreOptions};
use cardbox_engine::{Setting, SettingKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How long a load waits for the stored settings to arrive.
const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

fn sort_by_key(settings: &mut [Setting]) {
    settings.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
}

pub struct SettingsService {
    store: EntityStore<Setting>,
    defaults_created: AtomicBool,
    load_timeout: Duration,
}

impl SettingsService {
    pub fn new(
        adapter: Arc<dyn PersistenceAdapter<Setting>>,
        connectivity: Connectivity,
        options: StoreOptions,
    ) -> Self {
        Self {
            load_timeout: options.echo_timeout.unwrap_or(LOAD_TIMEOUT),
            store: EntityStore::new("settings", adapter, connectivity, options, sort_by_key),
            defaults_created: AtomicBool::new(false),
        }
    }

    /// Read the stored settings and create missing defaults once.
    pub async fn load(&self) -> Result<Vec<Setting>> {
        let mut collection = self.store.subscribe_collection();
        self.store.find(&Scope::global()).await?;

        if tokio::time::timeout(self.load_timeout, collection.recv())
            .await
            .is_err()
        {
            tracing::debug!("no stored settings arrived");
        }

        if !self.defaults_created.swap(true, Ordering::SeqCst) {
            let now = clock::now();
            let missing: Vec<Setting> = SettingKey::ALL
                .iter()
                .filter(|key| self.get(**key).is_none())
                .map(|key| Setting::default_for(*key, now))
                .collect();
            if !missing.is_empty() {
                tracing::info!(count = missing.len(), "creating default settings");
                self.store.create_many(missing).await?;
            }
        }

        Ok(self.store.snapshot())
    }

    pub fn get(&self, key: SettingKey) -> Option<Setting> {
        self.store.get(key.as_str())
    }

    /// The value for `key`; empty when unset.
    pub fn value(&self, key: SettingKey) -> String {
        self.get(key).map(|s| s.value).unwrap_or_default()
    }

    pub async fn update(&self, key: SettingKey, value: impl Into<String>) -> Result<Setting> {
        let mut setting = self
            .get(key)
            .unwrap_or_else(|| Setting::default_for(key, clock::now()));
        setting.value = value.into();
        self.store.update(setting).await
    }

    pub fn snapshot(&self) -> Vec<Setting> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Setting>> {
        self.store.subscribe_collection()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.store.subscribe_errors()
    }

    pub fn cancel_subscription(&self) {
        self.store.cancel_subscription();
    }
}
