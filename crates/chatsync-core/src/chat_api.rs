//! Remote chat backend contract.
//!
//! The backend is an opaque HTTP service. This module defines the request
//! and reply shapes the client relies on and the trait concrete transports
//! implement. Timeouts are enforced by callers, not by implementations.

use crate::conversation::{Message, MessageContext};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST {api_base}/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
    pub model: String,
}

/// A successful assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub analysis: Option<String>,
    pub context: Option<MessageContext>,
    pub code_blocks: Vec<String>,
    pub security_insights: Option<String>,
    /// Opaque planning data; surfaced to callers but never stored
    pub planning: Option<Value>,
}

impl ChatReply {
    /// Builds the assistant message that records this reply.
    pub fn to_message(&self) -> Message {
        let mut message = Message::assistant(self.text.clone());
        message.analysis = self.analysis.clone();
        message.context = self.context.clone().filter(|c| !c.is_empty());
        message.code_blocks = self.code_blocks.clone();
        message.security_insights = self.security_insights.clone();
        message
    }
}

/// Preferences attached to a feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPreferences {
    pub conversation_id: String,
}

/// Body of `POST {api_base}/api/learn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    /// The user message that prompted the rated reply
    pub message: String,
    /// The rated assistant reply
    pub response: String,
    pub feedback_score: i8,
    pub preferences: FeedbackPreferences,
}

/// Transport to the remote chat service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `GET /health`; `Ok(())` on any 2xx.
    async fn check_health(&self) -> Result<()>;

    /// Best-effort cross-origin probe issued before a chat request.
    async fn preflight(&self) -> Result<()>;

    /// `POST /chat`.
    ///
    /// # Errors
    ///
    /// - `ChatError::Remote` for non-2xx responses, with the server's message
    ///   when the body carries one
    /// - `ChatError::Network` for transport failures
    async fn send_chat(&self, request: &ChatRequest, bearer_token: &str) -> Result<ChatReply>;

    /// `POST /api/learn`.
    async fn submit_feedback(&self, submission: &FeedbackSubmission, bearer_token: &str)
    -> Result<()>;
}
