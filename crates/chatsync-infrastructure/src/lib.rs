pub mod compression;
pub mod config_service;
pub mod connectivity;
pub mod credentials;
pub mod file_conversation_store;
pub mod memory_conversation_store;
pub mod paths;
pub mod snapshot_hub;
pub mod storage;

pub use crate::compression::ZstdBase64Codec;
pub use crate::config_service::ConfigService;
pub use crate::connectivity::SharedConnectivity;
pub use crate::credentials::StaticCredentialProvider;
pub use crate::file_conversation_store::FileConversationStore;
pub use crate::memory_conversation_store::MemoryConversationStore;
