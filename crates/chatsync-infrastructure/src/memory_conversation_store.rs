//! In-memory `ConversationStore` implementation.

use crate::snapshot_hub::SnapshotHub;
use async_trait::async_trait;
use chatsync_core::conversation::{
    ConversationDocument, ConversationPatch, ConversationStore, DocumentSubscription,
};
use chatsync_core::error::{ChatError, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A document store held entirely in memory.
///
/// Used for ephemeral sessions and tests; snapshots are delivered through
/// a [`SnapshotHub`] just like the file-backed store.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    documents: RwLock<HashMap<String, ConversationDocument>>,
    hub: SnapshotHub,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document under a caller-chosen id.
    pub async fn insert(&self, conversation_id: impl Into<String>, document: ConversationDocument) {
        let conversation_id = conversation_id.into();
        let mut documents = self.documents.write().await;
        documents.insert(conversation_id.clone(), document.clone());
        self.hub.publish(&conversation_id, Some(document));
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn modify<F>(&self, conversation_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ConversationDocument),
    {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(conversation_id)
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;
        f(document);
        // Published under the write guard so snapshots follow write order.
        self.hub.publish(conversation_id, Some(document.clone()));
        Ok(())
    }
}

/// Generates a document id in the style of hosted document databases.
pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..20].to_string()
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>> {
        Ok(self.documents.read().await.get(conversation_id).cloned())
    }

    async fn create(&self, document: ConversationDocument) -> Result<String> {
        let conversation_id = new_document_id();
        self.insert(conversation_id.clone(), document).await;
        tracing::debug!("[MemoryConversationStore] created {}", conversation_id);
        Ok(conversation_id)
    }

    async fn update_messages(&self, conversation_id: &str, messages: Vec<Value>) -> Result<()> {
        self.modify(conversation_id, |document| {
            document.messages = Value::Array(messages);
            document.updated_at = Utc::now().to_rfc3339();
        })
        .await
    }

    async fn update_metadata(
        &self,
        conversation_id: &str,
        patch: ConversationPatch,
    ) -> Result<()> {
        self.modify(conversation_id, |document| patch.apply_to(document))
            .await
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let mut documents = self.documents.write().await;
        if documents.remove(conversation_id).is_some() {
            self.hub.publish(conversation_id, None);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<(String, ConversationDocument)>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|(_, document)| document.is_owned_by(user_id))
            .map(|(id, document)| (id.clone(), document.clone()))
            .collect())
    }

    async fn subscribe(&self, conversation_id: &str) -> Result<DocumentSubscription> {
        let documents = self.documents.read().await;
        self.hub
            .subscribe(conversation_id, || Ok(documents.get(conversation_id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_core::conversation::Message;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryConversationStore::new();
        let document = ConversationDocument::with_first_message("user1", &Message::user("Hi"));

        let id = store.create(document.clone()).await.unwrap();

        assert_eq!(id.len(), 20);
        assert_eq!(store.get(&id).await.unwrap(), Some(document));
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_messages_publishes_snapshot() {
        let store = MemoryConversationStore::new();
        store.insert("c1", ConversationDocument::empty("user1")).await;
        let mut subscription = store.subscribe("c1").await.unwrap();
        let initial = subscription.next().await.unwrap().unwrap();
        assert!(initial.message_records().is_none());

        store
            .update_messages("c1", vec![json!({"text": "a", "isUser": true})])
            .await
            .unwrap();

        let updated = subscription.next().await.unwrap().unwrap();
        assert_eq!(updated.message_records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryConversationStore::new();
        let err = store.update_messages("ghost", vec![]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_publishes_none() {
        let store = MemoryConversationStore::new();
        store.insert("c1", ConversationDocument::empty("user1")).await;
        let mut subscription = store.subscribe("c1").await.unwrap();
        subscription.next().await;

        store.delete("c1").await.unwrap();

        assert_eq!(subscription.next().await, Some(None));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_for_user_filters_by_owner() {
        let store = MemoryConversationStore::new();
        store.insert("a", ConversationDocument::empty("user1")).await;
        store.insert("b", ConversationDocument::empty("user2")).await;
        store.insert("c", ConversationDocument::empty("user1")).await;

        let mut ids: Vec<_> = store
            .list_for_user("user1")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        ids.sort();

        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_end_on_stored_state() {
        let store = std::sync::Arc::new(MemoryConversationStore::new());
        store.insert("c1", ConversationDocument::empty("user1")).await;
        let mut subscription = store.subscribe("c1").await.unwrap();
        subscription.next().await;

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update_metadata("c1", ConversationPatch::title(format!("t{i}")))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let stored = store.get("c1").await.unwrap();
        let mut latest = None;
        while let Ok(Some(snapshot)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), subscription.next()).await
        {
            latest = snapshot;
        }
        assert_eq!(latest, stored);
    }
}
