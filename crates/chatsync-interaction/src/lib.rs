//! HTTP transport to the remote chat service.

pub mod http_chat_backend;

pub use http_chat_backend::HttpChatBackend;
