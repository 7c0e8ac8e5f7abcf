//! Connectivity state.

use serde::{Deserialize, Serialize};

/// Whether the host currently has network connectivity.
///
/// Mirrors the platform's online/offline signal; it says nothing about
/// whether the chat backend itself is reachable. Whoever observes that
/// signal records it through `set_online`.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    fn set_online(&self, online: bool);
}

/// Reachability of the chat backend, derived from each health check.
///
/// Transient; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// A health check is in flight (initial state)
    Connecting,
    /// The last health check succeeded
    Connected,
    /// The last health check failed, or the host went offline
    Error,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Connecting
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(label)
    }
}
