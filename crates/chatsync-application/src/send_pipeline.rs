//! Optimistic send pipeline.
//!
//! # Flow
//!
//! ```text
//! send(target, text)
//!   │  empty text ─────────────▶ InvalidInput
//!   │  offline ────────────────▶ Offline        (no network call made)
//!   │  nobody signed in ───────▶ Unauthorized
//!   │  send already running ───▶ SendInProgress
//!   ▼
//! persist user message
//!   New:      create document { title, messages: [message] }, redirect
//!   Existing: optimistic append → rewrite stored list → confirm / discard
//!   ▼
//! request reply
//!   bearer token → preflight (best effort) → POST /chat (timed)
//!   ok:  append + persist assistant message
//!   err: view-only error indicator after the user message
//! ```
//!
//! A persisted user message is never retracted when the reply step fails.

use crate::conversation_state::ConversationState;
use crate::request_sequencer::RequestSequencer;
use crate::timeout::with_timeout;
use chatsync_core::auth::CredentialProvider;
use chatsync_core::chat_api::{ChatBackend, ChatReply, ChatRequest};
use chatsync_core::config::ClientConfig;
use chatsync_core::connectivity::Connectivity;
use chatsync_core::conversation::{
    ConversationDocument, ConversationStore, Message, MessageNormalizer,
};
use chatsync_core::error::{ChatError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Sentinel conversation id meaning "create a new conversation".
pub const NEW_CONVERSATION: &str = "new";

/// Where a message is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationTarget {
    /// Create a conversation with this message as its first entry
    New,
    /// Append to an existing conversation
    Existing(String),
}

impl ConversationTarget {
    /// Parses a route-style id; `"new"` is the creation sentinel.
    pub fn parse(id: &str) -> Self {
        if id == NEW_CONVERSATION {
            ConversationTarget::New
        } else {
            ConversationTarget::Existing(id.to_string())
        }
    }

    fn gate_key(&self) -> &str {
        match self {
            ConversationTarget::New => NEW_CONVERSATION,
            ConversationTarget::Existing(id) => id,
        }
    }
}

/// At most one in-flight send per conversation.
#[derive(Debug, Clone, Default)]
pub struct SendGate {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SendGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` until the returned permit is dropped.
    pub fn try_acquire(&self, key: &str) -> Result<SendPermit> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.to_string()) {
            return Err(ChatError::SendInProgress(key.to_string()));
        }
        Ok(SendPermit {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Held while a send runs; releases its conversation on drop.
#[derive(Debug)]
pub struct SendPermit {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Result of a send whose user message was persisted.
#[derive(Debug)]
pub struct SendOutcome {
    pub conversation_id: String,
    /// Set when a new conversation was created; the caller navigates here
    pub redirect_to: Option<String>,
    pub user_message: Message,
    /// The assistant reply, or why there is none
    pub reply: Result<Message>,
}

pub struct SendPipeline {
    store: Arc<dyn ConversationStore>,
    backend: Arc<dyn ChatBackend>,
    credentials: Arc<dyn CredentialProvider>,
    connectivity: Arc<dyn Connectivity>,
    config: ClientConfig,
    normalizer: MessageNormalizer,
    sequencer: Arc<RequestSequencer>,
    gate: SendGate,
}

impl SendPipeline {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        backend: Arc<dyn ChatBackend>,
        credentials: Arc<dyn CredentialProvider>,
        connectivity: Arc<dyn Connectivity>,
        config: ClientConfig,
    ) -> Self {
        Self {
            store,
            backend,
            credentials,
            connectivity,
            config,
            normalizer: MessageNormalizer::new(),
            sequencer: Arc::new(RequestSequencer::new()),
            gate: SendGate::new(),
        }
    }

    /// Normalizer used when reading stored messages back (retry).
    pub fn with_normalizer(mut self, normalizer: MessageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Shares request tickets with other pipelines.
    pub fn with_sequencer(mut self, sequencer: Arc<RequestSequencer>) -> Self {
        self.sequencer = sequencer;
        self
    }

    pub fn gate(&self) -> &SendGate {
        &self.gate
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a user message and requests the assistant reply.
    ///
    /// `view` is the state of the conversation currently on screen. It only
    /// receives writes when it shows the target conversation and is still
    /// open.
    ///
    /// # Errors
    ///
    /// Fails before the user message is persisted. Reply failures are
    /// reported in [`SendOutcome::reply`] instead.
    pub async fn send(
        &self,
        target: &ConversationTarget,
        text: &str,
        view: Option<&ConversationState>,
    ) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("Message is empty".to_string()));
        }
        self.ensure_online()?;
        let user_id = self.signed_in_user()?;
        let _permit = self.gate.try_acquire(target.gate_key())?;

        let message = Message::user(text);

        let (conversation_id, redirect_to, _created_permit) = match target {
            ConversationTarget::New => {
                let document = ConversationDocument::with_first_message(&user_id, &message);
                let conversation_id = self.store.create(document).await?;
                tracing::info!("[SendPipeline] created conversation {}", conversation_id);
                // The new id is busy until its first reply settles.
                let permit = self.gate.try_acquire(&conversation_id)?;
                (conversation_id.clone(), Some(conversation_id), Some(permit))
            }
            ConversationTarget::Existing(conversation_id) => {
                let view = view_for(view, conversation_id);
                self.append_and_persist(conversation_id, &user_id, &message, view)
                    .await?;
                (conversation_id.clone(), None, None)
            }
        };

        let view = view_for(view, &conversation_id);
        let reply = self
            .request_reply(&conversation_id, &user_id, &message, view)
            .await;

        Ok(SendOutcome {
            conversation_id,
            redirect_to,
            user_message: message,
            reply,
        })
    }

    /// Re-runs only the reply step for the conversation's last message.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when the last stored message is not an unanswered
    ///   user message
    /// - `NotFound` when the conversation is missing or not owned
    /// - any reply-step error
    pub async fn retry_reply(
        &self,
        conversation_id: &str,
        view: Option<&ConversationState>,
    ) -> Result<Message> {
        self.ensure_online()?;
        let user_id = self.signed_in_user()?;
        let _permit = self.gate.try_acquire(conversation_id)?;

        let document = self.owned_document(conversation_id, &user_id).await?;
        let messages = self.normalizer.normalize(&document.records_or_empty());
        let unanswered = messages
            .last()
            .filter(|m| m.is_user)
            .cloned()
            .ok_or_else(|| {
                ChatError::InvalidInput("No unanswered message to retry".to_string())
            })?;

        tracing::info!(
            "[SendPipeline] retrying reply for {} in {}",
            unanswered.id,
            conversation_id
        );

        let view = view_for(view, conversation_id);
        if let Some(view) = view {
            view.update(|ledger| ledger.clear_notices_for(&unanswered.id));
        }

        self.request_reply(conversation_id, &user_id, &unanswered, view)
            .await
    }

    fn ensure_online(&self) -> Result<()> {
        if self.connectivity.is_online() {
            Ok(())
        } else {
            tracing::warn!("[SendPipeline] offline, not sending");
            Err(ChatError::Offline)
        }
    }

    fn signed_in_user(&self) -> Result<String> {
        self.credentials
            .current_user_id()
            .ok_or_else(|| ChatError::unauthorized("No user is signed in"))
    }

    async fn owned_document(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ConversationDocument> {
        self.store
            .get(conversation_id)
            .await?
            .filter(|d| d.is_owned_by(user_id))
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))
    }

    /// Appends `message` to the stored raw list, leaving earlier records as stored.
    async fn persist_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        message: &Message,
    ) -> Result<()> {
        let document = self.owned_document(conversation_id, user_id).await?;
        let mut records = document.records_or_empty();
        records.push(message.to_record());
        self.store.update_messages(conversation_id, records).await
    }

    async fn append_and_persist(
        &self,
        conversation_id: &str,
        user_id: &str,
        message: &Message,
        view: Option<&ConversationState>,
    ) -> Result<()> {
        if let Some(view) = view {
            view.update(|ledger| ledger.append_optimistic(message.clone()));
        }

        match self.persist_message(conversation_id, user_id, message).await {
            Ok(()) => {
                if let Some(view) = view {
                    view.update(|ledger| ledger.mark_persisted(&message.id));
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "[SendPipeline] failed to persist {} in {}: {}",
                    message.id,
                    conversation_id,
                    e
                );
                if let Some(view) = view {
                    view.update(|ledger| ledger.discard(&message.id));
                }
                Err(e)
            }
        }
    }

    async fn request_reply(
        &self,
        conversation_id: &str,
        user_id: &str,
        user_message: &Message,
        view: Option<&ConversationState>,
    ) -> Result<Message> {
        let ticket = self.sequencer.begin(conversation_id);
        let result = self.fetch_reply(conversation_id, &user_message.text).await;

        if !self.sequencer.is_latest(&ticket) {
            tracing::debug!(
                "[SendPipeline] dropping late reply #{} for {}",
                ticket.seq,
                conversation_id
            );
            return Err(ChatError::internal("Reply superseded by a newer request"));
        }

        let outcome = match result {
            Ok(reply) => {
                let message = reply.to_message();
                self.append_and_persist(conversation_id, user_id, &message, view)
                    .await
                    .map(|()| message)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            tracing::warn!(
                "[SendPipeline] no reply for {} in {}: {}",
                user_message.id,
                conversation_id,
                e
            );
            if let Some(view) = view {
                view.update(|ledger| {
                    ledger.add_notice(&user_message.id, Message::reply_error(reply_error_text(e)))
                });
            }
        }

        outcome
    }

    async fn fetch_reply(&self, conversation_id: &str, text: &str) -> Result<ChatReply> {
        let token = self.credentials.bearer_token().await?;

        if let Err(e) = with_timeout(
            "preflight",
            self.config.preflight_timeout(),
            self.backend.preflight(),
        )
        .await
        {
            tracing::warn!("[SendPipeline] preflight failed, continuing: {}", e);
        }

        let request = ChatRequest {
            message: text.to_string(),
            conversation_id: conversation_id.to_string(),
            model: self.config.model.clone(),
        };

        with_timeout(
            "chat request",
            self.config.chat_timeout(),
            self.backend.send_chat(&request, &token),
        )
        .await
    }
}

fn view_for<'a>(
    view: Option<&'a ConversationState>,
    conversation_id: &str,
) -> Option<&'a ConversationState> {
    view.filter(|v| v.conversation_id() == conversation_id && v.is_active())
}

/// Text of the error indicator shown in place of a reply.
fn reply_error_text(err: &ChatError) -> String {
    match err {
        ChatError::NetworkTimeout { .. } => {
            "No response from the server. Please try again.".to_string()
        }
        ChatError::Remote { message, .. } => message.clone(),
        ChatError::Unauthorized(_) => "Please sign in again to continue.".to_string(),
        ChatError::Offline => "You are offline.".to_string(),
        other => format!("Something went wrong: {other}"),
    }
}
