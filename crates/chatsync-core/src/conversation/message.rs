//! Conversation message types.
//!
//! `Message` is the canonical in-memory shape every view consumes. Stored
//! records may look different (legacy sender names, compressed bodies,
//! missing fields); see [`super::normalizer`] for how they are brought into
//! this shape.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Text shown for a record that was absent from the stored list.
pub const MISSING_MESSAGE_TEXT: &str = "This message could not be loaded.";

/// Text of the assistant greeting used to repair an empty conversation.
pub const WELCOME_MESSAGE_TEXT: &str = "Hello! How can I help you today?";

/// Structured context attached to an assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

impl MessageContext {
    pub fn is_empty(&self) -> bool {
        self.emotion.is_none() && self.topics.is_empty()
    }
}

/// A single message in a conversation.
///
/// The serialized form uses the document store's field names (`isUser`,
/// `codeBlocks`, ...), so a normalized message can be written back as a
/// stored record and normalizes to itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Client-generated, time-ordered identifier
    pub id: String,
    /// Message body
    pub text: String,
    /// `true` for user-authored messages, `false` for assistant replies
    pub is_user: bool,
    /// Creation time (RFC 3339); empty when the stored record had none
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_blocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_insights: Option<String>,
    /// Set on placeholders and on local reply-failure indicators
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Set when `text` is still in compressed form
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub compressed: bool,
    /// The stored compressed body, kept for diagnostics after decompression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_compressed_text: Option<String>,
    /// Set when normalization hit an internal failure for this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_error: Option<String>,
}

impl Message {
    fn base(text: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: generate_message_id(),
            text: text.into(),
            is_user,
            timestamp: Utc::now().to_rfc3339(),
            analysis: None,
            context: None,
            code_blocks: Vec::new(),
            security_insights: None,
            is_error: false,
            compressed: false,
            original_compressed_text: None,
            internal_error: None,
        }
    }

    /// Creates a user-authored message stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self::base(text, true)
    }

    /// Creates an assistant message stamped with the current time.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::base(text, false)
    }

    /// The greeting used when a conversation has no valid message list.
    pub fn welcome() -> Self {
        Self::assistant(WELCOME_MESSAGE_TEXT)
    }

    /// A local-only assistant message signalling that no reply arrived.
    pub fn reply_error(reason: impl Into<String>) -> Self {
        let mut message = Self::assistant(reason);
        message.is_error = true;
        message
    }

    /// Stand-in for an absent stored record at `index`.
    ///
    /// The identifier is derived from the position so repeated normalization
    /// of the same list yields the same placeholder.
    pub fn placeholder(index: usize) -> Self {
        Self {
            id: format!("missing-{index}"),
            text: MISSING_MESSAGE_TEXT.to_string(),
            is_user: false,
            timestamp: String::new(),
            analysis: None,
            context: None,
            code_blocks: Vec::new(),
            security_insights: None,
            is_error: true,
            compressed: false,
            original_compressed_text: None,
            internal_error: None,
        }
    }

    /// Whether this is an assistant reply that carries a real answer.
    pub fn is_reply(&self) -> bool {
        !self.is_user && !self.is_error
    }

    /// Serializes into the stored record shape.
    pub fn to_record(&self) -> serde_json::Value {
        // Serializing a plain struct of strings, bools and vectors cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Generates a client-side, time-ordered message identifier (UUID v7).
pub fn generate_message_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
