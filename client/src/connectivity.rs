//! The connectivity oracle.
//!
//! Stores consult it before every write to choose between the backend path
//! and the local path. The stores only read it; the network-status
//! collaborator that owns the context flips it.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared online/offline flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Create an oracle with an initial state.
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            state: Arc::new(sender),
        }
    }

    /// An oracle that starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// An oracle that starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Whether the process is currently online.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a network status change.
    pub fn set_online(&self, online: bool) {
        let previous = self.state.send_replace(online);
        if previous != online {
            tracing::info!(online, "connectivity changed");
        }
    }

    /// Observe status changes.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}
