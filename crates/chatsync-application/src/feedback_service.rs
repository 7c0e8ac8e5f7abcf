//! Reply ratings.
//!
//! Each assistant reply can be rated once per session. Ratings live only in
//! this service; they are posted to the learning endpoint but never written
//! into the conversation document.

use crate::timeout::with_timeout;
use chatsync_core::auth::CredentialProvider;
use chatsync_core::chat_api::{ChatBackend, FeedbackPreferences, FeedbackSubmission};
use chatsync_core::conversation::Message;
use chatsync_core::error::{ChatError, Result};
use chatsync_core::feedback::{FeedbackRecord, FeedbackScore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub struct FeedbackService {
    backend: Arc<dyn ChatBackend>,
    credentials: Arc<dyn CredentialProvider>,
    timeout: Duration,
    records: Mutex<HashMap<String, FeedbackScore>>,
}

impl FeedbackService {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            credentials,
            timeout,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock_records(&self) -> MutexGuard<'_, HashMap<String, FeedbackScore>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rates the assistant reply `message_id` within `messages`.
    ///
    /// The rating is recorded before the network call and rolled back if the
    /// call fails, so a second click while the first is in flight is refused.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `message_id` is not in `messages`
    /// - `InvalidInput` if the message is not an assistant reply, or was
    ///   already rated
    /// - credential and transport errors from the submission
    pub async fn rate(
        &self,
        conversation_id: &str,
        messages: &[Message],
        message_id: &str,
        score: FeedbackScore,
    ) -> Result<FeedbackRecord> {
        let index = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| ChatError::not_found("message", message_id))?;
        let rated = &messages[index];
        if !rated.is_reply() {
            return Err(ChatError::InvalidInput(format!(
                "Message '{message_id}' is not an assistant reply"
            )));
        }

        {
            let mut records = self.lock_records();
            if records.contains_key(message_id) {
                return Err(ChatError::InvalidInput(format!(
                    "Message '{message_id}' was already rated"
                )));
            }
            records.insert(message_id.to_string(), score);
        }

        let prompt = messages[..index]
            .iter()
            .rev()
            .find(|m| m.is_user)
            .map(|m| m.text.clone())
            .unwrap_or_default();

        let submission = FeedbackSubmission {
            message: prompt,
            response: rated.text.clone(),
            feedback_score: score.value(),
            preferences: FeedbackPreferences {
                conversation_id: conversation_id.to_string(),
            },
        };

        if let Err(e) = self.submit(&submission).await {
            tracing::warn!(
                "[FeedbackService] rating {} failed, rolling back: {}",
                message_id,
                e
            );
            self.lock_records().remove(message_id);
            return Err(e);
        }

        tracing::info!("[FeedbackService] rated {} {:?}", message_id, score);
        Ok(FeedbackRecord {
            message_id: message_id.to_string(),
            score,
        })
    }

    async fn submit(&self, submission: &FeedbackSubmission) -> Result<()> {
        let token = self.credentials.bearer_token().await?;
        with_timeout(
            "feedback submission",
            self.timeout,
            self.backend.submit_feedback(submission, &token),
        )
        .await
    }

    pub fn score_for(&self, message_id: &str) -> Option<FeedbackScore> {
        self.lock_records().get(message_id).copied()
    }

    /// All ratings given this session.
    pub fn records(&self) -> Vec<FeedbackRecord> {
        let mut records: Vec<_> = self
            .lock_records()
            .iter()
            .map(|(message_id, score)| FeedbackRecord {
                message_id: message_id.clone(),
                score: *score,
            })
            .collect();
        records.sort_by(|a, b| a.message_id.cmp(&b.message_id));
        records
    }
}
