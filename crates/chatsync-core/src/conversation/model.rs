//! Conversation domain model.
//!
//! Two shapes live here:
//! - [`ConversationDocument`]: the stored document as the document store
//!   holds it, with the message list kept as raw, loosely-typed records.
//! - [`Conversation`]: the view-side model with normalized [`Message`]s.

use super::message::Message;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of characters taken from the first message for a title.
pub const TITLE_MAX_CHARS: usize = 30;

/// Title given to explicitly created, still-empty conversations.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// A conversation document as stored in the `conversations` collection.
///
/// `messages` stays a raw JSON value: stored records are heterogeneous and
/// the list itself may be missing or not an array at all. Only the
/// normalizer interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDocument {
    /// Owning user
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    /// RFC 3339 creation timestamp
    #[serde(default)]
    pub created_at: String,
    /// RFC 3339 timestamp of the last write
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub messages: Value,
}

impl ConversationDocument {
    /// Builds a fresh document owned by `user_id` holding `first` as its sole message.
    pub fn with_first_message(user_id: impl Into<String>, first: &Message) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            user_id: user_id.into(),
            title: title_from_message(&first.text),
            created_at: now.clone(),
            updated_at: now,
            pinned: false,
            archived: false,
            messages: Value::Array(vec![first.to_record()]),
        }
    }

    /// Builds an empty, explicitly created document.
    pub fn empty(user_id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            user_id: user_id.into(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            created_at: now.clone(),
            updated_at: now,
            pinned: false,
            archived: false,
            messages: Value::Array(Vec::new()),
        }
    }

    /// Whether `user_id` owns this document.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        !self.user_id.is_empty() && self.user_id == user_id
    }

    /// The raw record list, if the stored value is a non-empty array.
    pub fn message_records(&self) -> Option<&Vec<Value>> {
        match &self.messages {
            Value::Array(records) if !records.is_empty() => Some(records),
            _ => None,
        }
    }

    /// The raw record list, treating anything that isn't an array as empty.
    pub fn records_or_empty(&self) -> Vec<Value> {
        match &self.messages {
            Value::Array(records) => records.clone(),
            _ => Vec::new(),
        }
    }
}

/// A partial metadata update applied to a stored document.
///
/// Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
}

impl ConversationPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn pinned(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            ..Self::default()
        }
    }

    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    /// Applies this patch to `document`, bumping `updated_at`.
    pub fn apply_to(&self, document: &mut ConversationDocument) {
        if let Some(title) = &self.title {
            document.title = title.clone();
        }
        if let Some(pinned) = self.pinned {
            document.pinned = pinned;
        }
        if let Some(archived) = self.archived {
            document.archived = archived;
        }
        document.updated_at = Utc::now().to_rfc3339();
    }
}

/// A conversation as the view sees it: metadata plus normalized messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub pinned: bool,
    pub archived: bool,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Combines a stored document's metadata with already-normalized messages.
    pub fn from_document(
        id: impl Into<String>,
        document: &ConversationDocument,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: document.user_id.clone(),
            title: document.title.clone(),
            created_at: document.created_at.clone(),
            updated_at: document.updated_at.clone(),
            pinned: document.pinned,
            archived: document.archived,
            messages,
        }
    }

    /// The last message, if it is a user message that never got a reply.
    pub fn unanswered_user_message(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_user)
    }
}

/// Derives a conversation title from its first message.
///
/// Takes the first [`TITLE_MAX_CHARS`] characters and appends `...` when
/// the text was cut.
pub fn title_from_message(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
