//! Mock collaborators shared by the unit tests of this crate.

use async_trait::async_trait;
use chatsync_core::chat_api::{ChatBackend, ChatReply, ChatRequest, FeedbackSubmission};
use chatsync_core::conversation::{
    ConversationDocument, ConversationPatch, ConversationStore, DocumentSubscription,
};
use chatsync_core::error::{ChatError, Result};
use chatsync_infrastructure::MemoryConversationStore;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T>)>>;

/// Chat backend with scripted results.
///
/// Unscripted chat calls answer "Mock reply" and unscripted health checks
/// succeed, both immediately.
#[derive(Default)]
pub struct MockBackend {
    replies: Scripted<ChatReply>,
    health: Scripted<()>,
    preflight_fails: AtomicBool,
    feedback_error: Mutex<Option<ChatError>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    feedback: Mutex<Vec<FeedbackSubmission>>,
    health_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, text: &str) {
        self.push_reply_result(Ok(ChatReply {
            text: text.to_string(),
            ..ChatReply::default()
        }));
    }

    pub fn push_reply_result(&self, result: Result<ChatReply>) {
        self.push_reply_after(Duration::ZERO, result);
    }

    pub fn push_reply_after(&self, delay: Duration, result: Result<ChatReply>) {
        self.replies.lock().unwrap().push_back((delay, result));
    }

    pub fn push_health(&self, delay: Duration, result: Result<()>) {
        self.health.lock().unwrap().push_back((delay, result));
    }

    pub fn fail_preflight(&self) {
        self.preflight_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_feedback(&self, error: ChatError) {
        *self.feedback_error.lock().unwrap() = Some(error);
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn feedback_submissions(&self) -> Vec<FeedbackSubmission> {
        self.feedback.lock().unwrap().clone()
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    async fn play<T>(script: &Scripted<T>, fallback: impl FnOnce() -> Result<T>) -> Result<T> {
        let next = script.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => fallback(),
        }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn check_health(&self) -> Result<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        Self::play(&self.health, || Ok(())).await
    }

    async fn preflight(&self) -> Result<()> {
        if self.preflight_fails.load(Ordering::SeqCst) {
            Err(ChatError::network("preflight rejected"))
        } else {
            Ok(())
        }
    }

    async fn send_chat(&self, request: &ChatRequest, _bearer_token: &str) -> Result<ChatReply> {
        self.chat_requests.lock().unwrap().push(request.clone());
        Self::play(&self.replies, || {
            Ok(ChatReply {
                text: "Mock reply".to_string(),
                ..ChatReply::default()
            })
        })
        .await
    }

    async fn submit_feedback(
        &self,
        submission: &FeedbackSubmission,
        _bearer_token: &str,
    ) -> Result<()> {
        if let Some(error) = self.feedback_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.feedback.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Wraps a memory store and can be told to reject writes.
pub struct FlakyStore {
    inner: Arc<MemoryConversationStore>,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryConversationStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(ChatError::data_access("write rejected"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>> {
        self.inner.get(conversation_id).await
    }

    async fn create(&self, document: ConversationDocument) -> Result<String> {
        self.check_write()?;
        self.inner.create(document).await
    }

    async fn update_messages(&self, conversation_id: &str, messages: Vec<Value>) -> Result<()> {
        self.check_write()?;
        self.inner.update_messages(conversation_id, messages).await
    }

    async fn update_metadata(
        &self,
        conversation_id: &str,
        patch: ConversationPatch,
    ) -> Result<()> {
        self.check_write()?;
        self.inner.update_metadata(conversation_id, patch).await
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        self.check_write()?;
        self.inner.delete(conversation_id).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<(String, ConversationDocument)>> {
        self.inner.list_for_user(user_id).await
    }

    async fn subscribe(&self, conversation_id: &str) -> Result<DocumentSubscription> {
        self.inner.subscribe(conversation_id).await
    }
}
