//! Unified path management for chatsync files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/chatsync/          # Config directory
//! └── config.toml              # Client configuration
//!
//! ~/.local/share/chatsync/     # Data directory
//! └── conversations/           # File-backed conversation documents
//! ```

use std::path::PathBuf;

const APP_NAME: &str = "chatsync";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

pub struct ChatsyncPaths;

impl ChatsyncPaths {
    /// Returns the chatsync configuration directory.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path of `config.toml`.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the chatsync data directory.
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_end_with_app_name() {
        if let Ok(dir) = ChatsyncPaths::config_dir() {
            assert!(dir.ends_with(APP_NAME));
            assert!(ChatsyncPaths::config_file().unwrap().ends_with("chatsync/config.toml"));
        }
        if let Ok(dir) = ChatsyncPaths::data_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
