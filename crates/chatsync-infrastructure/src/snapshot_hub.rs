//! In-process fan-out of document snapshots.
//!
//! Both store implementations keep one `watch` channel per subscribed
//! document and publish a full snapshot after every write, while still
//! holding their write lock. An open channel therefore always carries the
//! latest committed document.

use chatsync_core::conversation::{DocumentSubscription, Snapshot};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct SnapshotHub {
    channels: Mutex<HashMap<String, watch::Sender<Snapshot>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a subscription on a document.
    ///
    /// An open channel already holds the latest snapshot and is joined as is.
    /// Otherwise `load` reads the current document while the hub is locked,
    /// so no publish can slip in between the read and the new channel.
    pub fn subscribe<F, E>(
        &self,
        conversation_id: &str,
        load: F,
    ) -> Result<DocumentSubscription, E>
    where
        F: FnOnce() -> Result<Snapshot, E>,
    {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        let receiver = match channels.get(conversation_id) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(load()?);
                channels.insert(conversation_id.to_string(), sender);
                receiver
            }
        };

        Ok(DocumentSubscription::new(conversation_id, receiver))
    }

    /// Publishes a snapshot to every open subscription on the document.
    ///
    /// Channels without receivers are dropped here.
    pub fn publish(&self, conversation_id: &str, snapshot: Snapshot) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(sender) = channels.get(conversation_id) else {
            return;
        };

        if sender.receiver_count() == 0 {
            channels.remove(conversation_id);
            return;
        }

        sender.send_replace(snapshot);
        tracing::debug!(
            "[SnapshotHub] published snapshot for {} to {} subscriber(s)",
            conversation_id,
            sender.receiver_count()
        );
    }

    /// Number of documents with at least one channel.
    pub fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
