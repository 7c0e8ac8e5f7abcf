//! Credential provider trait.
//!
//! The authentication provider itself is an external collaborator; the
//! client only needs the signed-in user's id and a fresh bearer token.

use crate::error::Result;
use async_trait::async_trait;

/// Supplies the identity and bearer credentials used for remote calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The signed-in user's id, or `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<String>;

    /// Obtains a fresh bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Unauthorized` when no valid credential is available.
    async fn bearer_token(&self) -> Result<String>;
}
