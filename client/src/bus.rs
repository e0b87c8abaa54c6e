//! Notification channels.
//!
//! Every store and the filter service publish on typed broadcast channels.
//! A publish happens only after the publisher has finished mutating its
//! state, so subscribers never observe a partial update. Subscribers run
//! independently; their relative order is unspecified.

use tokio::sync::broadcast;

/// Number of undelivered messages a slow subscriber may fall behind by.
pub const CHANNEL_CAPACITY: usize = 256;

/// A named publish/subscribe channel.
#[derive(Debug)]
pub struct Channel<T> {
    name: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Channel<T> {
    /// Create a channel without subscribers.
    pub fn new(name: &'static str) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { name, sender }
    }

    /// Subscribe to messages published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Publish to every current subscriber.
    ///
    /// Returns the number of subscribers that received the message.
    pub fn publish(&self, message: T) -> usize {
        let recipients = self.sender.send(message).unwrap_or(0);
        tracing::trace!(channel = self.name, recipients, "published");
        recipients
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}
