//! Live document subscriptions.

use super::model::ConversationDocument;
use tokio::sync::watch;

/// A full-replacement snapshot of one document; `None` once it is deleted.
pub type Snapshot = Option<ConversationDocument>;

/// Receiving side of a live subscription on a single document.
///
/// Snapshots are whole documents, never diffs. Intermediate states may be
/// skipped when writes arrive faster than they are read, so consumers must
/// treat each snapshot as the complete current state.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct DocumentSubscription {
    conversation_id: String,
    receiver: watch::Receiver<Snapshot>,
    delivered_initial: bool,
}

impl DocumentSubscription {
    /// Wraps the receiving half of a store's per-document channel.
    pub fn new(conversation_id: impl Into<String>, receiver: watch::Receiver<Snapshot>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            receiver,
            delivered_initial: false,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Waits for the next snapshot.
    ///
    /// The first call returns the state at subscription time immediately.
    /// Returns `None` when the store closed the channel.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.receiver.borrow_and_update().clone());
        }

        match self.receiver.changed().await {
            Ok(()) => Some(self.receiver.borrow_and_update().clone()),
            Err(_) => None,
        }
    }
}
