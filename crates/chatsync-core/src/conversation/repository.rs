//! Conversation store trait.
//!
//! Defines the document store operations the client depends on.

use super::model::{ConversationDocument, ConversationPatch};
use super::subscription::DocumentSubscription;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// An abstract document store holding the `conversations` collection.
///
/// This trait decouples synchronization and sending from the concrete
/// storage (remote document database, local files, memory).
///
/// # Implementation Notes
///
/// - Message lists are rewritten as a whole; there is no partial append.
/// - Every successful write must be observable through [`subscribe`]
///   as a full snapshot of the document.
///
/// [`subscribe`]: ConversationStore::subscribe
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Point-read of a document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(document))`: Document found
    /// - `Ok(None)`: Document not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>>;

    /// Creates a document and returns its newly assigned identifier.
    async fn create(&self, document: ConversationDocument) -> Result<String>;

    /// Replaces the whole message list of an existing document.
    ///
    /// Also bumps `updatedAt`. Fails with `NotFound` if the document is gone.
    async fn update_messages(&self, conversation_id: &str, messages: Vec<Value>) -> Result<()>;

    /// Applies a metadata patch to an existing document.
    async fn update_metadata(&self, conversation_id: &str, patch: ConversationPatch)
    -> Result<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete(&self, conversation_id: &str) -> Result<()>;

    /// Lists every document owned by `user_id` with its identifier.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<(String, ConversationDocument)>>;

    /// Opens a live subscription on one document.
    ///
    /// The subscription first yields the current state, then one snapshot
    /// per change. `None` snapshots mean the document was deleted.
    async fn subscribe(&self, conversation_id: &str) -> Result<DocumentSubscription>;
}
