//! Configuration service implementation.
//!
//! Loads [`ClientConfig`] from `~/.config/chatsync/config.toml`, then
//! applies environment overrides:
//!
//! | Variable | Field |
//! |---|---|
//! | `CHATSYNC_API_BASE_URL` | `api_base_url` |
//! | `CHATSYNC_MODEL` | `model` |
//! | `CHATSYNC_USER_ID` | `credentials.user_id` |
//! | `CHATSYNC_TOKEN` | `credentials.token` |
//!
//! A missing or unreadable file falls back to defaults, so the API base
//! always resolves (to `DEFAULT_API_BASE_URL` at worst).

use crate::paths::ChatsyncPaths;
use chatsync_core::config::ClientConfig;
use chatsync_core::error::{ChatError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

pub const ENV_API_BASE_URL: &str = "CHATSYNC_API_BASE_URL";
pub const ENV_MODEL: &str = "CHATSYNC_MODEL";
pub const ENV_USER_ID: &str = "CHATSYNC_USER_ID";
pub const ENV_TOKEN: &str = "CHATSYNC_TOKEN";

/// Loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    /// A service reading the default config file location.
    pub fn new() -> Self {
        Self {
            path: ChatsyncPaths::config_file().ok(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// A service reading an explicit config file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading it on first access.
    pub fn get_config(&self) -> ClientConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let file_config = match &self.path {
            Some(path) => Self::load_file(path).unwrap_or_else(|e| {
                tracing::warn!("[ConfigService] using defaults: {}", e);
                ClientConfig::default()
            }),
            None => ClientConfig::default(),
        };
        let loaded = apply_overrides(file_config, |key| std::env::var(key).ok());

        {
            let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = None;
    }

    /// Reads a config file; a missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<ClientConfig> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] {} not found, using defaults",
                path.display()
            );
            return Ok(ClientConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies environment overrides using `lookup` to read variables.
///
/// Empty values are ignored.
pub fn apply_overrides<F>(mut config: ClientConfig, lookup: F) -> ClientConfig
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(base) = lookup(ENV_API_BASE_URL) {
        config.api_base_url = base;
    }
    if let Some(model) = lookup(ENV_MODEL) {
        config.model = model;
    }
    if let Some(user_id) = lookup(ENV_USER_ID) {
        config.credentials.user_id = Some(user_id);
    }
    if let Some(token) = lookup(ENV_TOKEN) {
        config.credentials.token = Some(token);
    }
    config
}
