//! HttpChatBackend - REST implementation of the chat service contract.
//!
//! Endpoints (relative to the configured API base):
//! - `GET /health`
//! - `OPTIONS /chat` (preflight)
//! - `POST /chat`
//! - `POST /api/learn`
//!
//! No client-side timeouts are configured here; callers race each call
//! against their own timer.

use async_trait::async_trait;
use chatsync_core::chat_api::{ChatBackend, ChatReply, ChatRequest, FeedbackSubmission};
use chatsync_core::config::ClientConfig;
use chatsync_core::conversation::MessageContext;
use chatsync_core::error::{ChatError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// Chat backend that talks to the remote HTTP API.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: Client,
    api_base: String,
    origin: Option<String>,
}

impl HttpChatBackend {
    /// Creates a backend for the given API base URL.
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            origin: None,
        }
    }

    /// Creates a backend from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let backend = Self::new(config.api_base());
        match &config.origin {
            Some(origin) => backend.with_origin(origin.clone()),
            None => backend,
        }
    }

    /// Sets the origin announced by the preflight request.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_http_error(status, &body))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn check_health(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|err| map_transport_error("health check", err))?;

        Self::ensure_success(response).await.map(|_| ())
    }

    async fn preflight(&self) -> Result<()> {
        let origin = self.origin.as_deref().unwrap_or(&self.api_base);
        let response = self
            .client
            .request(reqwest::Method::OPTIONS, self.url("/chat"))
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .header(
                "Access-Control-Request-Headers",
                "authorization, content-type",
            )
            .send()
            .await
            .map_err(|err| map_transport_error("preflight", err))?;

        Self::ensure_success(response).await.map(|_| ())
    }

    async fn send_chat(&self, request: &ChatRequest, bearer_token: &str) -> Result<ChatReply> {
        tracing::debug!(
            "[HttpChatBackend] POST /chat conversation={} model={}",
            request.conversation_id,
            request.model
        );

        let response = self
            .client
            .post(self.url("/chat"))
            .bearer_auth(bearer_token)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| map_transport_error("chat request", err))?;

        let status = response.status();
        let response = Self::ensure_success(response).await?;
        let body: ChatReplyBody = response.json().await.map_err(|err| {
            ChatError::remote(
                Some(status.as_u16()),
                format!("Failed to parse chat response: {err}"),
            )
        })?;

        body.into_reply(status)
    }

    async fn submit_feedback(
        &self,
        submission: &FeedbackSubmission,
        bearer_token: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/learn"))
            .bearer_auth(bearer_token)
            .json(submission)
            .send()
            .await
            .map_err(|err| map_transport_error("feedback submission", err))?;

        Self::ensure_success(response).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct ChatReplyBody {
    response: Option<String>,
    message: Option<String>,
    analysis: Option<String>,
    context: Option<ContextBody>,
    code_blocks: Option<Vec<String>>,
    security_insights: Option<String>,
    planning: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ContextBody {
    emotion: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

impl ChatReplyBody {
    fn into_reply(self, status: StatusCode) -> Result<ChatReply> {
        let text = self.response.or(self.message).ok_or_else(|| {
            ChatError::remote(
                Some(status.as_u16()),
                "Chat response contained no message",
            )
        })?;

        Ok(ChatReply {
            text,
            analysis: self.analysis,
            context: self.context.map(|c| MessageContext {
                emotion: c.emotion,
                topics: c.topics,
            }),
            code_blocks: self.code_blocks.unwrap_or_default(),
            security_insights: self.security_insights,
            planning: self.planning.filter(|p| !p.is_null()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Builds a `Remote` error from a non-success response.
///
/// Uses the body's `message` field when present, otherwise a message
/// synthesized from the status code.
fn map_http_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Server responded with status {}", status.as_u16()));

    ChatError::remote(Some(status.as_u16()), message)
}

fn map_transport_error(operation: &str, err: reqwest::Error) -> ChatError {
    ChatError::network(format!("{operation} failed: {err}"))
}
