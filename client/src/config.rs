//! Configuration management for the client.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which backend the entity stores persist to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Embedded SQLite database, optionally replicated to a sync endpoint
    Local,
    /// Cloud document service, partitioned by owner
    Cloud,
}

impl FromStr for PersistenceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(PersistenceMode::Local),
            "cloud" => Ok(PersistenceMode::Cloud),
            other => Err(ConfigError::InvalidPersistenceMode(other.to_string())),
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::Local => f.write_str("local"),
            PersistenceMode::Cloud => f.write_str("cloud"),
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selection
    pub persistence_mode: PersistenceMode,
    /// Base URL of the cloud document service (cloud mode)
    pub cloud_url: Option<String>,
    /// Owner scope for cloud collections
    pub owner_id: Option<String>,
    /// SQLite file of the embedded store (local mode)
    pub local_database_path: String,
    /// Logical database holding stacks and tags
    pub entities_database: String,
    /// Logical database holding settings
    pub settings_database: String,
    /// Base URL replicated to in local mode; no replication when unset
    pub sync_url: Option<String>,
    /// Pause between replication rounds
    pub sync_interval: Duration,
    /// Pause between cloud collection refreshes
    pub poll_interval: Duration,
    /// How long a store waits for a backend echo; `None` disables waiting
    pub echo_timeout: Option<Duration>,
    /// Bearer token sent to the cloud document service
    pub auth_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let persistence_mode = lookup("PERSISTENCE_MODE")
            .map(|v| v.parse::<PersistenceMode>())
            .transpose()?
            .unwrap_or(PersistenceMode::Local);

        let cloud_url = lookup("CLOUD_URL");
        if persistence_mode == PersistenceMode::Cloud && cloud_url.is_none() {
            return Err(ConfigError::MissingCloudUrl);
        }

        let millis = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            lookup(name)
                .map(|v| v.parse().map_err(|_| ConfigError::InvalidNumber(name)))
                .transpose()
                .map(|v| v.unwrap_or(default))
        };

        let echo_timeout = match millis("ECHO_TIMEOUT_MS", 5000)? {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(Self {
            persistence_mode,
            cloud_url,
            owner_id: lookup("OWNER_ID"),
            local_database_path: lookup("LOCAL_DATABASE_PATH")
                .unwrap_or_else(|| "cardbox.db".to_string()),
            entities_database: lookup("ENTITIES_DATABASE")
                .unwrap_or_else(|| "entities".to_string()),
            settings_database: lookup("SETTINGS_DATABASE")
                .unwrap_or_else(|| "settings".to_string()),
            sync_url: lookup("SYNC_URL"),
            sync_interval: Duration::from_millis(millis("SYNC_INTERVAL_MS", 5000)?),
            poll_interval: Duration::from_millis(millis("POLL_INTERVAL_MS", 30000)?),
            echo_timeout,
            auth_token: lookup("AUTH_TOKEN"),
        })
    }

    /// Local-mode configuration for an embedded database file.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            persistence_mode: PersistenceMode::Local,
            cloud_url: None,
            owner_id: None,
            local_database_path: path.into(),
            entities_database: "entities".to_string(),
            settings_database: "settings".to_string(),
            sync_url: None,
            sync_interval: Duration::from_secs(5),
            poll_interval: Duration::from_secs(30),
            echo_timeout: Some(Duration::from_secs(5)),
            auth_token: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CLOUD_URL environment variable is required in cloud mode")]
    MissingCloudUrl,

    #[error("Invalid PERSISTENCE_MODE value: {0}")]
    InvalidPersistenceMode(String),

    #[error("Invalid {0} value")]
    InvalidNumber(&'static str),
}
