//! # Cardbox Client
//!
//! The runtime half of Cardbox: entity stores that keep an in-memory view of
//! stacks, cards, tags and settings consistent with a persistence backend,
//! and the notification channels derived views listen to.
//!
//! ## Design Principles
//!
//! - **Backend echo**: online writes reach the map only when the backend
//!   streams them back; offline writes are applied locally at once
//! - **No pipelining**: a store starts its next write after the previous one
//!   has been published
//! - **Explicit context**: connectivity, stores and settings hang off an
//!   [`AppContext`], never global state
//! - **Pluggable backends**: cloud, local-embedded and no-op adapters behind
//!   one [`PersistenceAdapter`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardbox_client::{AppContext, Config, Connectivity};
//! use cardbox_engine::Stack;
//!
//! # async fn run() -> cardbox_client::Result<()> {
//! let context = AppContext::connect(Config::local("cardbox.db"), Connectivity::online()).await?;
//! context.stacks().find(&context.scope()).await?;
//!
//! let stack = Stack::new(cardbox_client::clock::new_id(), "Spanish", cardbox_client::clock::now());
//! context.stacks().create(stack).await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod error;
pub mod filter;
pub mod persistence;
pub mod settings;
pub mod store;

pub use bus::Channel;
pub use config::{Config, ConfigError, PersistenceMode};
pub use connectivity::Connectivity;
pub use context::{Adapters, AppContext};
pub use error::{Error, Result};
pub use filter::{FilterService, FilteredCards};
pub use persistence::{AdapterEvent, PersistenceAdapter, Scope};
pub use settings::SettingsService;
pub use store::{CardsStore, EntityStore, StacksStore, StoreOptions, TagsStore};
