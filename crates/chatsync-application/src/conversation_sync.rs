//! Conversation synchronization.
//!
//! Opening a conversation runs one fetch + subscribe cycle:
//!
//! 1. Fetch the document once. Missing, or owned by someone else → `NotFound`;
//!    no subscription is opened.
//! 2. If it has no valid message list, synthesize a welcome message and try
//!    to persist that repair. A failed repair is logged; local state still
//!    uses the synthesized list.
//! 3. Subscribe. Every snapshot is re-checked for ownership and normalized
//!    before it replaces the local list.
//!
//! A snapshot that fails the ownership check (or reports deletion) emits
//! `SyncEvent::NotFound` and ends the subscription.

use crate::conversation_state::ConversationState;
use chatsync_core::conversation::{
    Conversation, ConversationDocument, ConversationStore, DocumentSubscription, Message,
    MessageNormalizer,
};
use chatsync_core::error::{ChatError, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Notifications delivered to the view while a conversation is open.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Initial state after fetch (and repair)
    Loaded(Conversation),
    /// A snapshot replaced the local state
    Updated(Conversation),
    /// The conversation vanished or is no longer owned by the user
    NotFound,
}

/// Runs fetch + subscribe cycles against a document store.
#[derive(Clone)]
pub struct ConversationSync {
    store: Arc<dyn ConversationStore>,
    normalizer: MessageNormalizer,
}

impl ConversationSync {
    pub fn new(store: Arc<dyn ConversationStore>, normalizer: MessageNormalizer) -> Self {
        Self { store, normalizer }
    }

    /// Opens `conversation_id` on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the document is missing or owned by another user
    /// - store errors from the initial fetch or from subscribing
    pub async fn open(&self, conversation_id: &str, user_id: &str) -> Result<SyncHandle> {
        tracing::debug!("[ConversationSync] opening {}", conversation_id);

        let document = self
            .store
            .get(conversation_id)
            .await?
            .filter(|d| d.is_owned_by(user_id))
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;

        let messages = match document.message_records() {
            Some(records) => self.normalizer.normalize(records),
            None => self.repair(conversation_id).await,
        };

        let state = ConversationState::new(conversation_id, &document, messages);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = events_tx.send(SyncEvent::Loaded(state.conversation()));

        let subscription = match self.store.subscribe(conversation_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                state.close();
                return Err(e);
            }
        };

        let task = tokio::spawn(run_subscription(
            subscription,
            Arc::clone(&state),
            self.normalizer.clone(),
            user_id.to_string(),
            events_tx,
        ));

        Ok(SyncHandle {
            state,
            events: Some(events_rx),
            task: Some(task),
        })
    }

    async fn repair(&self, conversation_id: &str) -> Vec<Message> {
        let welcome = Message::welcome();
        tracing::info!(
            "[ConversationSync] {} has no valid message list, repairing",
            conversation_id
        );

        if let Err(e) = self
            .store
            .update_messages(conversation_id, vec![welcome.to_record()])
            .await
        {
            tracing::warn!(
                "[ConversationSync] failed to persist repair for {}: {}",
                conversation_id,
                e
            );
        }

        vec![welcome]
    }
}

async fn run_subscription(
    mut subscription: DocumentSubscription,
    state: Arc<ConversationState>,
    normalizer: MessageNormalizer,
    user_id: String,
    events: mpsc::UnboundedSender<SyncEvent>,
) {
    let cancel = state.cancellation_token();

    loop {
        let snapshot = tokio::select! {
            _ = cancel.cancelled() => break,
            snapshot = subscription.next() => snapshot,
        };

        let Some(snapshot) = snapshot else {
            tracing::debug!(
                "[ConversationSync] store closed subscription for {}",
                state.conversation_id()
            );
            break;
        };

        match snapshot.filter(|d: &ConversationDocument| d.is_owned_by(&user_id)) {
            Some(document) => {
                let messages = document
                    .message_records()
                    .map(|records| normalizer.normalize(records));
                if state.apply_snapshot(&document, messages) {
                    let _ = events.send(SyncEvent::Updated(state.conversation()));
                }
            }
            None => {
                tracing::info!(
                    "[ConversationSync] {} no longer available, unsubscribing",
                    state.conversation_id()
                );
                state.close();
                let _ = events.send(SyncEvent::NotFound);
                break;
            }
        }
    }
}

/// An open conversation. Dropping it unsubscribes.
#[derive(Debug)]
pub struct SyncHandle {
    state: Arc<ConversationState>,
    events: Option<mpsc::UnboundedReceiver<SyncEvent>>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn conversation_id(&self) -> &str {
        self.state.conversation_id()
    }

    pub fn state(&self) -> Arc<ConversationState> {
        Arc::clone(&self.state)
    }

    /// Whether the subscription is still delivering snapshots.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Takes the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.events.take()
    }

    /// Waits for the next event, if the receiver hasn't been taken.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }

    /// Stops the subscription. The local state refuses writes afterwards.
    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.state.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Keeps at most one open conversation.
///
/// Switching to a different conversation unsubscribes the previous one
/// before the new fetch starts.
pub struct SyncController {
    sync: ConversationSync,
    active: Mutex<Option<SyncHandle>>,
}

impl SyncController {
    pub fn new(sync: ConversationSync) -> Self {
        Self {
            sync,
            active: Mutex::new(None),
        }
    }

    /// Makes `conversation_id` the open conversation.
    ///
    /// Re-opening the conversation that is already open and active returns
    /// its existing state and no new event receiver.
    pub async fn switch_to(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(Arc<ConversationState>, Option<mpsc::UnboundedReceiver<SyncEvent>>)> {
        let mut active = self.active.lock().await;

        if let Some(handle) = active.as_ref()
            && handle.conversation_id() == conversation_id
            && handle.is_active()
        {
            return Ok((handle.state(), None));
        }

        if let Some(previous) = active.take() {
            tracing::debug!(
                "[SyncController] leaving {} for {}",
                previous.conversation_id(),
                conversation_id
            );
            previous.unsubscribe();
        }

        let mut handle = self.sync.open(conversation_id, user_id).await?;
        let events = handle.take_events();
        let state = handle.state();
        *active = Some(handle);
        Ok((state, events))
    }

    /// State of the open conversation, if any.
    pub async fn active_state(&self) -> Option<Arc<ConversationState>> {
        self.active.lock().await.as_ref().map(SyncHandle::state)
    }

    /// Closes the open conversation.
    pub async fn close(&self) {
        if let Some(handle) = self.active.lock().await.take() {
            handle.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FlakyStore;
    use chatsync_core::conversation::{ConversationPatch, WELCOME_MESSAGE_TEXT};
    use chatsync_infrastructure::MemoryConversationStore;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn document_with(user_id: &str, messages: Value) -> ConversationDocument {
        let mut document = ConversationDocument::empty(user_id);
        document.messages = messages;
        document
    }

    async fn next(handle: &mut SyncHandle) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), handle.next_event())
            .await
            .expect("event within timeout")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn test_missing_conversation_is_not_found() {
        let store = Arc::new(MemoryConversationStore::new());
        let sync = ConversationSync::new(store, MessageNormalizer::new());

        let err = sync.open("missing", "user1").await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_foreign_conversation_is_indistinguishable_from_missing() {
        let store = Arc::new(MemoryConversationStore::new());
        store
            .insert("abc123", document_with("user1", json!([{"text": "hi", "isUser": true}])))
            .await;
        let sync = ConversationSync::new(store, MessageNormalizer::new());

        let foreign = sync.open("abc123", "user2").await.unwrap_err();
        let missing = sync.open("zzz999", "user2").await.unwrap_err();

        assert_eq!(foreign, ChatError::conversation_not_found("abc123"));
        assert_eq!(missing, ChatError::conversation_not_found("zzz999"));
    }

    #[tokio::test]
    async fn test_open_loads_normalized_messages() {
        let store = Arc::new(MemoryConversationStore::new());
        store
            .insert(
                "c1",
                document_with("user1", json!([{"id": "1", "text": "hi", "sender": "user"}, null])),
            )
            .await;
        let sync = ConversationSync::new(store, MessageNormalizer::new());

        let mut handle = sync.open("c1", "user1").await.unwrap();

        match next(&mut handle).await {
            SyncEvent::Loaded(conversation) => {
                assert_eq!(conversation.messages.len(), 2);
                assert!(conversation.messages[0].is_user);
                assert!(conversation.messages[1].is_error);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_message_list_is_repaired() {
        let store = Arc::new(MemoryConversationStore::new());
        store.insert("c1", document_with("user1", Value::Null)).await;
        let sync = ConversationSync::new(store.clone(), MessageNormalizer::new());

        let handle = sync.open("c1", "user1").await.unwrap();

        let messages = handle.state().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, WELCOME_MESSAGE_TEXT);

        let stored = store.get("c1").await.unwrap().unwrap();
        assert_eq!(stored.message_records().unwrap()[0]["text"], WELCOME_MESSAGE_TEXT);
    }

    #[tokio::test]
    async fn test_failed_repair_is_not_fatal() {
        let inner = Arc::new(MemoryConversationStore::new());
        inner.insert("c1", document_with("user1", json!("garbage"))).await;
        let store = Arc::new(FlakyStore::new(inner.clone()));
        store.fail_writes(true);
        let sync = ConversationSync::new(store, MessageNormalizer::new());

        let handle = sync.open("c1", "user1").await.unwrap();

        assert_eq!(handle.state().messages()[0].text, WELCOME_MESSAGE_TEXT);
        let stored = inner.get("c1").await.unwrap().unwrap();
        assert!(stored.message_records().is_none());
    }

    #[tokio::test]
    async fn test_snapshots_replace_local_state() {
        let store = Arc::new(MemoryConversationStore::new());
        store
            .insert("c1", document_with("user1", json!([{"id": "1", "text": "a", "isUser": true}])))
            .await;
        let sync = ConversationSync::new(store.clone(), MessageNormalizer::new());
        let mut handle = sync.open("c1", "user1").await.unwrap();
        assert!(matches!(next(&mut handle).await, SyncEvent::Loaded(_)));
        // Initial snapshot from the subscription itself.
        assert!(matches!(next(&mut handle).await, SyncEvent::Updated(_)));

        store
            .update_messages(
                "c1",
                vec![
                    json!({"id": "1", "text": "a", "isUser": true}),
                    json!({"id": "2", "text": "b", "isUser": false}),
                ],
            )
            .await
            .unwrap();

        match next(&mut handle).await {
            SyncEvent::Updated(conversation) => {
                let texts: Vec<_> = conversation.messages.iter().map(|m| m.text.as_str()).collect();
                assert_eq!(texts, vec!["a", "b"]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ownership_change_emits_not_found_and_unsubscribes() {
        let store = Arc::new(MemoryConversationStore::new());
        store.insert("c1", document_with("user1", json!([]))).await;
        let sync = ConversationSync::new(store.clone(), MessageNormalizer::new());
        let mut handle = sync.open("c1", "user1").await.unwrap();
        next(&mut handle).await;
        next(&mut handle).await;

        store.insert("c1", document_with("user2", json!([]))).await;

        assert_eq!(next(&mut handle).await, SyncEvent::NotFound);
        assert!(!handle.is_active());
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn test_deletion_emits_not_found() {
        let store = Arc::new(MemoryConversationStore::new());
        store.insert("c1", document_with("user1", json!([]))).await;
        let sync = ConversationSync::new(store.clone(), MessageNormalizer::new());
        let mut handle = sync.open("c1", "user1").await.unwrap();
        next(&mut handle).await;
        next(&mut handle).await;

        store.delete("c1").await.unwrap();

        assert_eq!(next(&mut handle).await, SyncEvent::NotFound);
    }

    #[tokio::test]
    async fn test_no_state_updates_after_unsubscribe() {
        let store = Arc::new(MemoryConversationStore::new());
        store
            .insert("c1", document_with("user1", json!([{"id": "1", "text": "a"}])))
            .await;
        let sync = ConversationSync::new(store.clone(), MessageNormalizer::new());
        let handle = sync.open("c1", "user1").await.unwrap();
        let state = handle.state();

        handle.unsubscribe();
        store
            .update_metadata("c1", ConversationPatch::title("after"))
            .await
            .unwrap();
        store.update_messages("c1", vec![]).await.unwrap();
        tokio::task::yield_now().await;

        assert!(!state.is_active());
        assert_eq!(state.messages().len(), 1);
        assert_ne!(state.conversation().title, "after");
    }

    #[tokio::test]
    async fn test_controller_switch_closes_previous() {
        let store = Arc::new(MemoryConversationStore::new());
        store.insert("a", document_with("user1", json!([]))).await;
        store.insert("b", document_with("user1", json!([]))).await;
        let controller =
            SyncController::new(ConversationSync::new(store, MessageNormalizer::new()));

        let (first, events) = controller.switch_to("a", "user1").await.unwrap();
        assert!(events.is_some());
        let (again, events) = controller.switch_to("a", "user1").await.unwrap();
        assert!(events.is_none());
        assert!(Arc::ptr_eq(&first, &again));

        let (second, _) = controller.switch_to("b", "user1").await.unwrap();

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(
            controller.active_state().await.unwrap().conversation_id(),
            "b"
        );

        controller.close().await;
        assert!(!second.is_active());
        assert!(controller.active_state().await.is_none());
    }
}
