//! Conversation listing and metadata operations.
//!
//! Every operation checks ownership first; a conversation owned by someone
//! else is reported as `NotFound`, exactly like a missing one.

use chatsync_core::conversation::{
    Conversation, ConversationDocument, ConversationPatch, ConversationStore, MessageNormalizer,
};
use chatsync_core::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub updated_at: String,
    pub pinned: bool,
    pub archived: bool,
    pub message_count: usize,
}

impl ConversationSummary {
    fn from_document(id: String, document: &ConversationDocument) -> Self {
        Self {
            id,
            title: document.title.clone(),
            updated_at: document.updated_at.clone(),
            pinned: document.pinned,
            archived: document.archived,
            message_count: document.message_records().map_or(0, Vec::len),
        }
    }
}

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    normalizer: MessageNormalizer,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>, normalizer: MessageNormalizer) -> Self {
        Self { store, normalizer }
    }

    /// Lists the user's conversations: pinned first, then most recently
    /// updated. Archived conversations are left out unless requested.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        include_archived: bool,
    ) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<_> = self
            .store
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|(_, document)| document.is_owned_by(user_id))
            .filter(|(_, document)| include_archived || !document.archived)
            .map(|(id, document)| ConversationSummary::from_document(id, &document))
            .collect();

        summaries.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(summaries)
    }

    /// One-shot read of a conversation with normalized messages.
    pub async fn load(&self, conversation_id: &str, user_id: &str) -> Result<Conversation> {
        let document = self.owned(conversation_id, user_id).await?;
        let messages = self.normalizer.normalize(&document.records_or_empty());
        Ok(Conversation::from_document(
            conversation_id,
            &document,
            messages,
        ))
    }

    /// Creates an empty conversation and returns its id.
    pub async fn create_empty(&self, user_id: &str) -> Result<String> {
        if user_id.is_empty() {
            return Err(ChatError::unauthorized("No user is signed in"));
        }
        let id = self.store.create(ConversationDocument::empty(user_id)).await?;
        tracing::info!("[ConversationService] created empty conversation {}", id);
        Ok(id)
    }

    pub async fn rename(&self, conversation_id: &str, user_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::InvalidInput("Title is empty".to_string()));
        }
        self.owned(conversation_id, user_id).await?;
        self.store
            .update_metadata(conversation_id, ConversationPatch::title(title))
            .await
    }

    pub async fn set_pinned(
        &self,
        conversation_id: &str,
        user_id: &str,
        pinned: bool,
    ) -> Result<()> {
        self.owned(conversation_id, user_id).await?;
        self.store
            .update_metadata(conversation_id, ConversationPatch::pinned(pinned))
            .await
    }

    pub async fn set_archived(
        &self,
        conversation_id: &str,
        user_id: &str,
        archived: bool,
    ) -> Result<()> {
        self.owned(conversation_id, user_id).await?;
        self.store
            .update_metadata(conversation_id, ConversationPatch::archived(archived))
            .await
    }

    pub async fn delete(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.owned(conversation_id, user_id).await?;
        tracing::info!("[ConversationService] deleting {}", conversation_id);
        self.store.delete(conversation_id).await
    }

    async fn owned(&self, conversation_id: &str, user_id: &str) -> Result<ConversationDocument> {
        self.store
            .get(conversation_id)
            .await?
            .filter(|d| d.is_owned_by(user_id))
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_infrastructure::MemoryConversationStore;
    use serde_json::json;

    fn document(user_id: &str, title: &str, updated_at: &str) -> ConversationDocument {
        let mut document = ConversationDocument::empty(user_id);
        document.title = title.to_string();
        document.updated_at = updated_at.to_string();
        document
    }

    async fn service_with(
        docs: Vec<(&str, ConversationDocument)>,
    ) -> (ConversationService, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new());
        for (id, doc) in docs {
            store.insert(id, doc).await;
        }
        (
            ConversationService::new(store.clone(), MessageNormalizer::new()),
            store,
        )
    }

    #[tokio::test]
    async fn test_list_orders_pinned_then_recent() {
        let mut pinned = document("user1", "pinned", "2024-01-01T00:00:00Z");
        pinned.pinned = true;
        let mut archived = document("user1", "archived", "2024-03-01T00:00:00Z");
        archived.archived = true;
        let (service, _) = service_with(vec![
            ("old", document("user1", "old", "2024-01-02T00:00:00Z")),
            ("new", document("user1", "new", "2024-02-01T00:00:00Z")),
            ("pin", pinned),
            ("arc", archived),
            ("other", document("user2", "theirs", "2024-05-01T00:00:00Z")),
        ])
        .await;

        let titles: Vec<_> = service
            .list_for_user("user1", false)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["pinned", "new", "old"]);

        let all = service.list_for_user("user1", true).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1].title, "archived");
    }

    #[tokio::test]
    async fn test_load_normalizes_messages() {
        let mut doc = document("user1", "t", "2024-01-01T00:00:00Z");
        doc.messages = json!([{"text": "a"}, {"text": "b", "sender": "user"}]);
        let (service, _) = service_with(vec![("c1", doc)]).await;

        let conversation = service.load("c1", "user1").await.unwrap();

        assert_eq!(conversation.id, "c1");
        assert!(!conversation.messages[0].is_user);
        assert!(conversation.messages[1].is_user);
    }

    #[tokio::test]
    async fn test_metadata_updates() {
        let (service, store) =
            service_with(vec![("c1", document("user1", "t", "2024-01-01T00:00:00Z"))]).await;

        service.rename("c1", "user1", "  Renamed ").await.unwrap();
        service.set_pinned("c1", "user1", true).await.unwrap();
        service.set_archived("c1", "user1", true).await.unwrap();

        let stored = store.get("c1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(stored.pinned);
        assert!(stored.archived);
        assert_ne!(stored.updated_at, "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_foreign_conversation_operations_are_not_found() {
        let (service, store) =
            service_with(vec![("abc123", document("user1", "t", "2024-01-01T00:00:00Z"))]).await;

        assert!(service.load("abc123", "user2").await.unwrap_err().is_not_found());
        assert!(service.rename("abc123", "user2", "x").await.unwrap_err().is_not_found());
        assert!(service.delete("abc123", "user2").await.unwrap_err().is_not_found());
        assert!(store.get("abc123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected() {
        let (service, _) =
            service_with(vec![("c1", document("user1", "t", "2024-01-01T00:00:00Z"))]).await;

        let err = service.rename("c1", "user1", "  ").await.unwrap_err();

        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let (service, store) = service_with(vec![]).await;

        let id = service.create_empty("user1").await.unwrap();
        let conversation = service.load(&id, "user1").await.unwrap();
        assert_eq!(conversation.title, "New Conversation");

        service.delete(&id, "user1").await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
