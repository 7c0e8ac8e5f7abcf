//! Error types for the chatsync client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for every chatsync crate.
///
/// Variants follow the client's failure taxonomy: missing or foreign
/// conversations, credential problems, timeouts, remote failures and
/// connectivity loss. `MalformedData` exists for completeness but is
/// recovered locally by the normalizer and never returned from a pipeline.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatError {
    /// Entity not found, or not owned by the caller
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// No valid credential is available
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A request exceeded its allotted time without any response
    #[error("No response from {operation} within {timeout_secs}s")]
    NetworkTimeout {
        operation: String,
        timeout_secs: u64,
    },

    /// The server answered with a non-success status
    #[error("Server error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    /// Transport failure before any HTTP status was received
    #[error("Network error: {0}")]
    Network(String),

    /// No network connectivity was detected before attempting a call
    #[error("You appear to be offline")]
    Offline,

    /// A stored record violates the message shape
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// A send is already outstanding for the conversation
    #[error("A message is already being sent in conversation '{0}'")]
    SendInProgress(String),

    /// Rejected caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Data access error (document store layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a NotFound error for a conversation
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::not_found("Conversation", id)
    }

    /// Creates an Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates a NetworkTimeout error
    pub fn timeout(operation: impl Into<String>, timeout_secs: u64) -> Self {
        Self::NetworkTimeout {
            operation: operation.into(),
            timeout_secs,
        }
    }

    /// Creates a Remote error
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Creates a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NetworkTimeout { .. })
    }

    /// Check if this is an offline error
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }

    /// Check if this is an Unauthorized error
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether the view should offer a retry action for this error.
    ///
    /// Returns true for timeouts, transport failures, offline errors and
    /// server errors that are 5xx or carry no status.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout { .. } | Self::Network(_) | Self::Offline => true,
            Self::Remote { status, .. } => status.is_none_or(|s| s >= 500),
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::DataAccess(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ChatError>`.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_display_includes_status() {
        let err = ChatError::remote(Some(502), "Bad gateway");
        assert_eq!(err.to_string(), "Server error (502): Bad gateway");

        let err = ChatError::remote(None, "boom");
        assert_eq!(err.to_string(), "Server error: boom");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ChatError::timeout("chat", 30).is_retryable());
        assert!(ChatError::Offline.is_retryable());
        assert!(ChatError::remote(Some(503), "down").is_retryable());
        assert!(!ChatError::remote(Some(400), "bad request").is_retryable());
        assert!(!ChatError::conversation_not_found("abc").is_retryable());
        assert!(!ChatError::unauthorized("no token").is_retryable());
    }

    #[test]
    fn test_not_found_hides_ownership() {
        let err = ChatError::conversation_not_found("abc123");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity not found: Conversation 'abc123'");
    }
}
