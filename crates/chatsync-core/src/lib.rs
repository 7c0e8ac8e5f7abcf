pub mod auth;
pub mod chat_api;
pub mod config;
pub mod connectivity;
pub mod conversation;
pub mod error;
pub mod feedback;

// Re-export common error type
pub use error::{ChatError, Result};
