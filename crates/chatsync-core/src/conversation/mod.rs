//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `message`: Canonical message type (`Message`, `MessageContext`)
//! - `model`: Stored document and view-side conversation (`ConversationDocument`, `Conversation`)
//! - `normalizer`: Stored record → `Message` conversion (`MessageNormalizer`)
//! - `repository`: Document store trait (`ConversationStore`)
//! - `subscription`: Live snapshot stream (`DocumentSubscription`)

mod message;
mod model;
mod normalizer;
mod repository;
mod subscription;

// Re-export public API
pub use message::{
    MISSING_MESSAGE_TEXT, Message, MessageContext, WELCOME_MESSAGE_TEXT, generate_message_id,
};
pub use model::{
    Conversation, ConversationDocument, ConversationPatch, DEFAULT_CONVERSATION_TITLE,
    TITLE_MAX_CHARS, title_from_message,
};
pub use normalizer::{
    Decompressor, MessageBody, MessageNormalizer, RawRecord, RecordFields, SenderField,
};
pub use repository::ConversationStore;
pub use subscription::{DocumentSubscription, Snapshot};
