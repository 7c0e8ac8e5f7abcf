//! Composition root.
//!
//! Builds every collaborator once from configuration and hands them to the
//! use cases. Nothing below this layer reaches for globals.

use anyhow::{Context, Result, anyhow};
use chatsync_application::{
    ConnectionMonitor, ConversationService, ConversationSync, FeedbackService, SendPipeline,
    SyncController,
};
use chatsync_core::auth::CredentialProvider;
use chatsync_core::chat_api::ChatBackend;
use chatsync_core::config::ClientConfig;
use chatsync_core::conversation::{ConversationStore, MessageNormalizer};
use chatsync_infrastructure::{
    ConfigService, FileConversationStore, SharedConnectivity, StaticCredentialProvider,
    ZstdBase64Codec,
};
use chatsync_interaction::HttpChatBackend;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct BootstrapOptions {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub offline: bool,
}

pub struct AppBootstrap {
    pub config: ClientConfig,
    store: Arc<dyn ConversationStore>,
    backend: Arc<dyn ChatBackend>,
    credentials: Arc<dyn CredentialProvider>,
    connectivity: SharedConnectivity,
    normalizer: MessageNormalizer,
}

impl AppBootstrap {
    pub fn new(options: BootstrapOptions) -> Result<Self> {
        let config_service = match options.config_path {
            Some(path) => ConfigService::with_path(path),
            None => ConfigService::new(),
        };
        let config = config_service.get_config();
        tracing::debug!("[Bootstrap] API base: {}", config.api_base());

        let store = match options.data_dir {
            Some(dir) => FileConversationStore::new(&dir)
                .with_context(|| format!("Failed to open store at {}", dir.display()))?,
            None => FileConversationStore::default_location()
                .context("Failed to open default conversation store")?,
        };
        tracing::debug!(
            "[Bootstrap] conversations in {}",
            store.conversations_dir().display()
        );

        Ok(Self {
            store: Arc::new(store),
            backend: Arc::new(HttpChatBackend::from_config(&config)),
            credentials: Arc::new(StaticCredentialProvider::from_config(&config.credentials)),
            connectivity: SharedConnectivity::new(!options.offline),
            normalizer: MessageNormalizer::with_decompressor(Arc::new(ZstdBase64Codec::new())),
            config,
        })
    }

    /// The signed-in user, required by every conversation command.
    pub fn user_id(&self) -> Result<String> {
        self.credentials.current_user_id().ok_or_else(|| {
            anyhow!("Not signed in: set CHATSYNC_USER_ID or [credentials] user_id in config.toml")
        })
    }

    pub fn send_pipeline(&self) -> SendPipeline {
        SendPipeline::new(
            self.store.clone(),
            self.backend.clone(),
            self.credentials.clone(),
            Arc::new(self.connectivity.clone()),
            self.config.clone(),
        )
        .with_normalizer(self.normalizer.clone())
    }

    pub fn sync_controller(&self) -> SyncController {
        SyncController::new(ConversationSync::new(
            self.store.clone(),
            self.normalizer.clone(),
        ))
    }

    pub fn conversation_service(&self) -> ConversationService {
        ConversationService::new(self.store.clone(), self.normalizer.clone())
    }

    pub fn connection_monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor::new(
            self.backend.clone(),
            Arc::new(self.connectivity.clone()),
            &self.config,
        )
    }

    pub fn feedback_service(&self) -> FeedbackService {
        FeedbackService::new(
            self.backend.clone(),
            self.credentials.clone(),
            self.config.chat_timeout(),
        )
    }
}
