//! Two-writer message ledger.
//!
//! A conversation's local message list has two producers:
//! - the send pipeline, which appends optimistic user messages (and
//!   assistant replies) before the store confirms them
//! - the snapshot handler, which installs every document snapshot the
//!   store delivers
//!
//! Snapshots are authoritative and replace the list wholesale, by arrival
//! order. Each optimistic entry moves through an explicit state:
//!
//! ```text
//! Pending ──persisted / seen in snapshot──▶ Confirmed
//!    │
//!    ├──snapshot without it──▶ Superseded ──later snapshot with it──▶ Confirmed
//!    │
//!    └──persistence failed──▶ Discarded
//! ```
//!
//! View-only notices (a failed reply's error indicator) are anchored to
//! the message they follow and are never part of what gets persisted.

use chatsync_core::conversation::Message;
use std::collections::HashMap;

/// Lifecycle of an optimistically appended message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Shown locally, not yet known to be stored
    Pending,
    /// Stored, or present in an authoritative snapshot
    Confirmed,
    /// Overwritten by a snapshot that did not contain it
    Superseded,
    /// Removed because persisting it failed
    Discarded,
}

#[derive(Debug, Clone)]
struct Notice {
    after_id: String,
    message: Message,
}

#[derive(Debug, Default)]
pub struct MessageLedger {
    confirmed: Vec<Message>,
    pending: Vec<Message>,
    notices: Vec<Notice>,
    states: HashMap<String, EntryState>,
    snapshots_applied: u64,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger seeded with an already-confirmed list.
    pub fn with_confirmed(messages: Vec<Message>) -> Self {
        Self {
            confirmed: messages,
            ..Self::default()
        }
    }

    /// Appends a message ahead of remote confirmation.
    pub fn append_optimistic(&mut self, message: Message) {
        self.states.insert(message.id.clone(), EntryState::Pending);
        self.pending.push(message);
    }

    /// Records that `message_id` was stored.
    ///
    /// A still-pending entry moves to the end of the confirmed list so it
    /// stays visible until a snapshot includes it.
    pub fn mark_persisted(&mut self, message_id: &str) {
        if let Some(index) = self.pending.iter().position(|m| m.id == message_id) {
            let message = self.pending.remove(index);
            if !self.confirmed.iter().any(|m| m.id == message_id) {
                self.confirmed.push(message);
            }
        }
        if self.states.contains_key(message_id) {
            self.states
                .insert(message_id.to_string(), EntryState::Confirmed);
        }
    }

    /// Drops an optimistic entry whose persistence failed.
    pub fn discard(&mut self, message_id: &str) {
        let before = self.pending.len();
        self.pending.retain(|m| m.id != message_id);
        if self.pending.len() != before {
            self.states
                .insert(message_id.to_string(), EntryState::Discarded);
        }
    }

    /// Installs an authoritative snapshot as the full message list.
    pub fn apply_snapshot(&mut self, messages: Vec<Message>) {
        for pending in self.pending.drain(..) {
            let state = if messages.iter().any(|m| m.id == pending.id) {
                EntryState::Confirmed
            } else {
                EntryState::Superseded
            };
            self.states.insert(pending.id, state);
        }

        for message in &messages {
            if let Some(state) = self.states.get_mut(&message.id) {
                *state = EntryState::Confirmed;
            }
        }

        self.notices
            .retain(|notice| messages.iter().any(|m| m.id == notice.after_id));
        self.confirmed = messages;
        self.snapshots_applied += 1;
    }

    /// Shows a view-only notice right after `after_id`.
    pub fn add_notice(&mut self, after_id: &str, message: Message) {
        self.notices.retain(|n| n.after_id != after_id);
        self.notices.push(Notice {
            after_id: after_id.to_string(),
            message,
        });
    }

    /// Removes any notice anchored to `after_id`.
    pub fn clear_notices_for(&mut self, after_id: &str) {
        self.notices.retain(|n| n.after_id != after_id);
    }

    pub fn state_of(&self, message_id: &str) -> Option<EntryState> {
        self.states.get(message_id).copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }

    /// The list the view renders: confirmed, then pending, with notices
    /// placed after their anchors.
    pub fn messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(
            self.confirmed.len() + self.pending.len() + self.notices.len(),
        );
        for message in self.confirmed.iter().chain(self.pending.iter()) {
            out.push(message.clone());
            out.extend(
                self.notices
                    .iter()
                    .filter(|n| n.after_id == message.id)
                    .map(|n| n.message.clone()),
            );
        }
        out
    }

    /// The last real message, if it is from the user and has no reply.
    ///
    /// Notices are not messages and don't count as replies.
    pub fn unanswered_user_message(&self) -> Option<&Message> {
        self.confirmed
            .iter()
            .chain(self.pending.iter())
            .last()
            .filter(|m| m.is_user)
    }
}
