//! Monotonic request tickets.
//!
//! Every reply request takes a ticket. When a result arrives, it is only
//! applied if its ticket is still the newest one for that conversation;
//! anything older is a late result and gets dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub conversation_id: String,
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    next: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes every earlier one for the conversation.
    pub fn begin(&self, conversation_id: &str) -> RequestTicket {
        let seq = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation_id.to_string(), seq);
        RequestTicket {
            conversation_id: conversation_id.to_string(),
            seq,
        }
    }

    /// Whether `ticket` is still the newest for its conversation.
    pub fn is_latest(&self, ticket: &RequestTicket) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket.conversation_id)
            .is_some_and(|seq| *seq == ticket.seq)
    }
}
