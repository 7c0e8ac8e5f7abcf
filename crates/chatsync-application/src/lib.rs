//! Application layer for chatsync.
//!
//! Use cases that coordinate the document store, the chat backend and the
//! local view state of a conversation.

pub mod connection_monitor;
pub mod conversation_service;
pub mod conversation_state;
pub mod conversation_sync;
pub mod feedback_service;
pub mod message_ledger;
pub mod request_sequencer;
pub mod send_pipeline;
pub mod timeout;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection_monitor::{ConnectionMonitor, RetryOutcome};
pub use conversation_service::{ConversationService, ConversationSummary};
pub use conversation_state::ConversationState;
pub use conversation_sync::{ConversationSync, SyncController, SyncEvent, SyncHandle};
pub use feedback_service::FeedbackService;
pub use message_ledger::{EntryState, MessageLedger};
pub use request_sequencer::{RequestSequencer, RequestTicket};
pub use send_pipeline::{ConversationTarget, SendGate, SendOutcome, SendPermit, SendPipeline};
