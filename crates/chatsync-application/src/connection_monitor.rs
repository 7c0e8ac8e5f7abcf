//! Backend reachability and manual retry.
//!
//! ```text
//!              health ok
//! Connecting ───────────▶ Connected
//!     │  ▲                    │
//!     │  │ retry / online     │ offline
//!     ▼  │                    ▼
//!     Error ◀─────────────────┘
//!        health failed / timed out
//! ```

use crate::conversation_state::ConversationState;
use crate::send_pipeline::SendPipeline;
use crate::timeout::with_timeout;
use chatsync_core::chat_api::ChatBackend;
use chatsync_core::config::ClientConfig;
use chatsync_core::connectivity::{ConnectionStatus, Connectivity};
use chatsync_core::conversation::Message;
use chatsync_core::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Result of a manual retry.
#[derive(Debug)]
pub struct RetryOutcome {
    pub status: ConnectionStatus,
    /// Present when an unanswered user message was re-sent
    pub reply: Option<Result<Message>>,
}

pub struct ConnectionMonitor {
    backend: Arc<dyn ChatBackend>,
    connectivity: Arc<dyn Connectivity>,
    health_timeout: Duration,
    max_visible_retries: u32,
    status: watch::Sender<ConnectionStatus>,
    retry_attempts: AtomicU32,
}

impl ConnectionMonitor {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        connectivity: Arc<dyn Connectivity>,
        config: &ClientConfig,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            backend,
            connectivity,
            health_timeout: config.health_timeout(),
            max_visible_retries: config.max_visible_retries,
            status,
            retry_attempts: AtomicU32::new(0),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receives every status transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!("[ConnectionMonitor] {} -> {}", current, status);
            *current = status;
            true
        });
    }

    /// Runs one health check and records the resulting status.
    pub async fn check_health(&self) -> ConnectionStatus {
        if !self.connectivity.is_online() {
            self.set_status(ConnectionStatus::Error);
            return ConnectionStatus::Error;
        }

        self.set_status(ConnectionStatus::Connecting);
        let status = match with_timeout(
            "health check",
            self.health_timeout,
            self.backend.check_health(),
        )
        .await
        {
            Ok(()) => {
                self.retry_attempts.store(0, Ordering::SeqCst);
                ConnectionStatus::Connected
            }
            Err(e) => {
                tracing::warn!("[ConnectionMonitor] health check failed: {}", e);
                ConnectionStatus::Error
            }
        };
        self.set_status(status);
        status
    }

    /// The host lost connectivity. Sends fail fast until it comes back.
    pub fn handle_offline(&self) {
        tracing::info!("[ConnectionMonitor] offline");
        self.connectivity.set_online(false);
        self.set_status(ConnectionStatus::Error);
    }

    /// The host regained connectivity; re-checks the backend.
    pub async fn handle_online(&self) -> ConnectionStatus {
        tracing::info!("[ConnectionMonitor] back online");
        self.connectivity.set_online(true);
        self.check_health().await
    }

    /// Manual retry: re-checks health, then re-sends the reply request for
    /// the open conversation's unanswered user message, if there is one.
    pub async fn retry(
        &self,
        pipeline: &SendPipeline,
        view: Option<&ConversationState>,
    ) -> RetryOutcome {
        let attempt = self.retry_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("[ConnectionMonitor] retry attempt {}", attempt);

        let status = self.check_health().await;
        if status != ConnectionStatus::Connected {
            return RetryOutcome {
                status,
                reply: None,
            };
        }

        let reply = match view.filter(|v| v.is_active()) {
            Some(view) if view.unanswered_user_message().is_some() => {
                Some(pipeline.retry_reply(view.conversation_id(), Some(view)).await)
            }
            _ => None,
        };

        RetryOutcome { status, reply }
    }

    /// Retries since the last successful health check.
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.load(Ordering::SeqCst)
    }

    /// Whether the view should still show a retry affordance.
    pub fn should_offer_retry(&self) -> bool {
        self.retry_attempts() < self.max_visible_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send_pipeline::ConversationTarget;
    use crate::test_support::MockBackend;
    use chatsync_core::conversation::{ConversationDocument, ConversationStore};
    use chatsync_core::error::ChatError;
    use chatsync_infrastructure::{
        MemoryConversationStore, SharedConnectivity, StaticCredentialProvider,
    };
    use serde_json::json;

    fn monitor(backend: Arc<MockBackend>, connectivity: &SharedConnectivity) -> ConnectionMonitor {
        ConnectionMonitor::new(
            backend,
            Arc::new(connectivity.clone()),
            &ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_initial_status_is_connecting() {
        let monitor = monitor(Arc::new(MockBackend::new()), &SharedConnectivity::default());
        assert_eq!(monitor.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn test_healthy_backend_connects() {
        let monitor = monitor(Arc::new(MockBackend::new()), &SharedConnectivity::default());
        let mut changes = monitor.subscribe();

        assert_eq!(monitor.check_health().await, ConnectionStatus::Connected);
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_failed_health_check_is_error() {
        let backend = Arc::new(MockBackend::new());
        backend.push_health(Duration::ZERO, Err(ChatError::remote(Some(503), "down")));
        let monitor = monitor(backend, &SharedConnectivity::default());

        assert_eq!(monitor.check_health().await, ConnectionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_timeout_then_manual_retry() {
        let backend = Arc::new(MockBackend::new());
        backend.push_health(Duration::from_secs(60), Ok(()));
        let monitor = monitor(backend.clone(), &SharedConnectivity::default());

        let started = tokio::time::Instant::now();
        assert_eq!(monitor.check_health().await, ConnectionStatus::Error);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));

        let pipeline = pipeline_for(backend.clone(), Arc::new(MemoryConversationStore::new()));
        let outcome = monitor.retry(&pipeline, None).await;

        assert_eq!(outcome.status, ConnectionStatus::Connected);
        assert!(outcome.reply.is_none());
        assert_eq!(backend.health_calls(), 2);
        assert_eq!(monitor.retry_attempts(), 0);
    }

    #[tokio::test]
    async fn test_offline_and_online_transitions() {
        let backend = Arc::new(MockBackend::new());
        let connectivity = SharedConnectivity::default();
        let monitor = monitor(backend.clone(), &connectivity);
        monitor.check_health().await;

        monitor.handle_offline();
        assert!(!connectivity.is_online());
        assert_eq!(monitor.status(), ConnectionStatus::Error);
        assert_eq!(monitor.check_health().await, ConnectionStatus::Error);
        assert_eq!(backend.health_calls(), 1);

        monitor.handle_online().await;
        assert!(connectivity.is_online());
        assert_eq!(monitor.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_offline_signal_reaches_send_pipeline() {
        let backend = Arc::new(MockBackend::new());
        let connectivity = SharedConnectivity::default();
        let monitor = monitor(backend.clone(), &connectivity);
        let pipeline = SendPipeline::new(
            Arc::new(MemoryConversationStore::new()),
            backend.clone(),
            Arc::new(StaticCredentialProvider::signed_in("user1", "t")),
            Arc::new(connectivity.clone()),
            ClientConfig::default(),
        );

        monitor.handle_offline();
        let err = pipeline
            .send(&ConversationTarget::New, "Hello", None)
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::Offline);
        assert!(backend.chat_requests().is_empty());

        monitor.handle_online().await;
        let outcome = pipeline
            .send(&ConversationTarget::New, "Hello", None)
            .await
            .unwrap();
        assert!(outcome.reply.is_ok());
    }

    #[tokio::test]
    async fn test_retry_affordance_is_capped() {
        let backend = Arc::new(MockBackend::new());
        for _ in 0..3 {
            backend.push_health(Duration::ZERO, Err(ChatError::network("refused")));
        }
        let monitor = monitor(backend.clone(), &SharedConnectivity::default());
        let pipeline = pipeline_for(backend, Arc::new(MemoryConversationStore::new()));

        for expected in 1..=3 {
            assert!(monitor.should_offer_retry());
            let outcome = monitor.retry(&pipeline, None).await;
            assert_eq!(outcome.status, ConnectionStatus::Error);
            assert_eq!(monitor.retry_attempts(), expected);
        }

        assert!(!monitor.should_offer_retry());
    }

    #[tokio::test]
    async fn test_retry_resends_unanswered_message() {
        let backend = Arc::new(MockBackend::new());
        backend.push_health(Duration::ZERO, Err(ChatError::network("refused")));
        backend.push_reply("Back again");
        let store = Arc::new(MemoryConversationStore::new());
        let question = Message::user("Are you there?");
        let mut document = ConversationDocument::empty("user1");
        document.messages = json!([question.to_record()]);
        store.insert("c1", document.clone()).await;
        let state = ConversationState::new("c1", &document, vec![question]);
        let monitor = monitor(backend.clone(), &SharedConnectivity::default());
        let pipeline = pipeline_for(backend.clone(), store.clone());

        assert_eq!(monitor.check_health().await, ConnectionStatus::Error);
        let outcome = monitor.retry(&pipeline, Some(&state)).await;

        assert_eq!(outcome.status, ConnectionStatus::Connected);
        assert_eq!(outcome.reply.unwrap().unwrap().text, "Back again");
        let stored = store.get("c1").await.unwrap().unwrap();
        assert_eq!(stored.message_records().unwrap().len(), 2);
    }

    fn pipeline_for(
        backend: Arc<MockBackend>,
        store: Arc<MemoryConversationStore>,
    ) -> SendPipeline {
        SendPipeline::new(
            store,
            backend,
            Arc::new(StaticCredentialProvider::signed_in("user1", "t")),
            Arc::new(SharedConnectivity::default()),
            ClientConfig::default(),
        )
    }
}
