//! File-backed `ConversationStore` implementation.
//!
//! Directory structure:
//! ```text
//! base_dir/
//! └── conversations/
//!     ├── <conversation-id>.json
//!     └── <conversation-id>.json
//! ```
//!
//! - **Atomic**: every write goes through [`AtomicJsonFile`]
//! - **Async-safe**: file I/O runs in `tokio::task::spawn_blocking`
//! - **Live**: snapshots are delivered in-process through a [`SnapshotHub`]

use crate::memory_conversation_store::new_document_id;
use crate::snapshot_hub::SnapshotHub;
use crate::storage::AtomicJsonFile;
use async_trait::async_trait;
use chatsync_core::conversation::{
    ConversationDocument, ConversationPatch, ConversationStore, DocumentSubscription,
};
use chatsync_core::error::{ChatError, Result};
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

const CONVERSATIONS_DIR: &str = "conversations";

pub struct FileConversationStore {
    root_dir: PathBuf,
    hub: Arc<SnapshotHub>,
}

impl FileConversationStore {
    /// Creates a store rooted at `base_dir`, creating the directory layout.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = base_dir.as_ref().join(CONVERSATIONS_DIR);
        fs::create_dir_all(&root_dir).map_err(|e| {
            ChatError::data_access(format!(
                "Failed to create conversations directory {}: {}",
                root_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            root_dir,
            hub: Arc::new(SnapshotHub::new()),
        })
    }

    /// Creates a store at the default data location.
    pub fn default_location() -> Result<Self> {
        let base_dir = crate::paths::ChatsyncPaths::data_dir()
            .map_err(|e| ChatError::config(format!("Failed to get data directory: {}", e)))?;
        Self::new(base_dir)
    }

    pub fn conversations_dir(&self) -> &Path {
        &self.root_dir
    }

    fn document_file(&self, conversation_id: &str) -> Result<AtomicJsonFile<ConversationDocument>> {
        let valid = !conversation_id.is_empty()
            && conversation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            // Ids that can't name a file can't name a stored document either.
            return Err(ChatError::conversation_not_found(conversation_id));
        }
        Ok(AtomicJsonFile::new(
            self.root_dir.join(format!("{conversation_id}.json")),
        ))
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationDocument>> {
        let file = match self.document_file(conversation_id) {
            Ok(file) => file,
            Err(_) => return Ok(None),
        };

        task::spawn_blocking(move || file.load().map_err(ChatError::from))
            .await
            .map_err(|e| ChatError::internal(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn modify<F>(&self, conversation_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ConversationDocument) + Send + 'static,
    {
        let file = self.document_file(conversation_id)?;
        let hub = self.hub.clone();
        let id = conversation_id.to_string();

        // Publishing inside the file lock keeps snapshot order equal to write order.
        let updated = task::spawn_blocking(move || {
            file.update_existing(f, |document| hub.publish(&id, Some(document.clone())))
        })
        .await
        .map_err(|e| ChatError::internal(format!("Failed to spawn blocking task: {}", e)))??;

        match updated {
            Some(_) => Ok(()),
            None => Err(ChatError::conversation_not_found(conversation_id)),
        }
    }

    fn list_sync(root_dir: &Path, user_id: &str) -> Result<Vec<(String, ConversationDocument)>> {
        let mut documents = Vec::new();

        for entry in fs::read_dir(root_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            match AtomicJsonFile::<ConversationDocument>::new(path.clone()).load() {
                Ok(Some(document)) if document.is_owned_by(user_id) => {
                    documents.push((id, document));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        "[FileConversationStore] skipping unreadable document {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(documents)
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>> {
        self.load(conversation_id).await
    }

    async fn create(&self, document: ConversationDocument) -> Result<String> {
        let conversation_id = new_document_id();
        let file = self.document_file(&conversation_id)?;
        let stored = document.clone();

        task::spawn_blocking(move || file.save(&stored).map_err(ChatError::from))
            .await
            .map_err(|e| ChatError::internal(format!("Failed to spawn blocking task: {}", e)))??;

        tracing::debug!("[FileConversationStore] created {}", conversation_id);
        self.hub.publish(&conversation_id, Some(document));
        Ok(conversation_id)
    }

    async fn update_messages(&self, conversation_id: &str, messages: Vec<Value>) -> Result<()> {
        self.modify(conversation_id, move |document| {
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
        self.modify(conversation_id, move |document| patch.apply_to(document))
            .await
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let file = match self.document_file(conversation_id) {
            Ok(file) => file,
            Err(_) => return Ok(()),
        };

        let hub = self.hub.clone();
        let id = conversation_id.to_string();

        task::spawn_blocking(move || {
            file.remove(|| hub.publish(&id, None))
                .map_err(ChatError::from)
        })
        .await
        .map_err(|e| ChatError::internal(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<(String, ConversationDocument)>> {
        let root_dir = self.root_dir.clone();
        let user_id = user_id.to_string();

        task::spawn_blocking(move || Self::list_sync(&root_dir, &user_id))
            .await
            .map_err(|e| ChatError::internal(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn subscribe(&self, conversation_id: &str) -> Result<DocumentSubscription> {
        let file = self.document_file(conversation_id).ok();
        let hub = self.hub.clone();
        let id = conversation_id.to_string();

        task::spawn_blocking(move || {
            hub.subscribe(&id, || match &file {
                Some(file) => file.load().map_err(ChatError::from),
                None => Ok(None),
            })
        })
        .await
        .map_err(|e| ChatError::internal(format!("Failed to spawn blocking task: {}", e)))?
    }
}
