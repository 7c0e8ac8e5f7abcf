//! Local view state of one open conversation.

use crate::message_ledger::{EntryState, MessageLedger};
use chatsync_core::conversation::{Conversation, ConversationDocument, Message};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared local state for the conversation currently on screen.
///
/// Written by the snapshot handler and by the send pipeline. Once closed,
/// every write is refused, so nothing updates a view that has moved on.
#[derive(Debug)]
pub struct ConversationState {
    conversation_id: String,
    ledger: Mutex<MessageLedger>,
    document: Mutex<ConversationDocument>,
    cancel: CancellationToken,
    version: watch::Sender<u64>,
}

impl ConversationState {
    pub fn new(
        conversation_id: impl Into<String>,
        document: &ConversationDocument,
        messages: Vec<Message>,
    ) -> Arc<Self> {
        let mut metadata = document.clone();
        metadata.messages = Value::Null;
        let (version, _) = watch::channel(0);

        Arc::new(Self {
            conversation_id: conversation_id.into(),
            ledger: Mutex::new(MessageLedger::with_confirmed(messages)),
            document: Mutex::new(metadata),
            cancel: CancellationToken::new(),
            version,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Whether the state still accepts writes.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Token cancelled when the state is closed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Closes the state. No write lands after this returns.
    pub fn close(&self) {
        let _ledger = self.lock_ledger();
        self.cancel.cancel();
    }

    fn lock_ledger(&self) -> MutexGuard<'_, MessageLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to the ledger unless the state is closed.
    ///
    /// Returns `None` when the write was refused.
    pub fn update<R>(&self, f: impl FnOnce(&mut MessageLedger) -> R) -> Option<R> {
        let result = {
            let mut ledger = self.lock_ledger();
            if self.cancel.is_cancelled() {
                return None;
            }
            f(&mut ledger)
        };
        self.version.send_modify(|v| *v += 1);
        Some(result)
    }

    /// Installs a snapshot: document metadata plus its normalized messages.
    pub fn apply_snapshot(
        &self,
        document: &ConversationDocument,
        messages: Option<Vec<Message>>,
    ) -> bool {
        let applied = self.update(|ledger| {
            if let Some(messages) = messages {
                ledger.apply_snapshot(messages);
            }
        });
        if applied.is_some() {
            let mut metadata = document.clone();
            metadata.messages = Value::Null;
            *self.document.lock().unwrap_or_else(PoisonError::into_inner) = metadata;
        }
        applied.is_some()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_ledger().messages()
    }

    pub fn state_of(&self, message_id: &str) -> Option<EntryState> {
        self.lock_ledger().state_of(message_id)
    }

    pub fn unanswered_user_message(&self) -> Option<Message> {
        self.lock_ledger().unanswered_user_message().cloned()
    }

    /// The conversation as currently shown.
    pub fn conversation(&self) -> Conversation {
        let document = self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Conversation::from_document(self.conversation_id.clone(), &document, self.messages())
    }

    /// Receives a bumped counter after every accepted write.
    pub fn watch_changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}
