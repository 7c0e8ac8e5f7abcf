//! Static credential provider.

use async_trait::async_trait;
use chatsync_core::auth::CredentialProvider;
use chatsync_core::config::CredentialsConfig;
use chatsync_core::error::{ChatError, Result};

/// Serves a fixed user id and bearer token.
///
/// Suited to command-line use and tests; interactive sign-in flows
/// implement [`CredentialProvider`] themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    user_id: Option<String>,
    token: Option<String>,
}

impl StaticCredentialProvider {
    pub fn new(user_id: Option<String>, token: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|u| !u.is_empty()),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn signed_in(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()), Some(token.into()))
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(config.user_id.clone(), config.token.clone())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    async fn bearer_token(&self) -> Result<String> {
        if self.user_id.is_none() {
            return Err(ChatError::unauthorized("No user is signed in"));
        }
        self.token
            .clone()
            .ok_or_else(|| ChatError::unauthorized("No bearer token configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_in_provider() {
        let provider = StaticCredentialProvider::signed_in("user1", "tok");
        assert_eq!(provider.current_user_id().as_deref(), Some("user1"));
        assert_eq!(provider.bearer_token().await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let provider =
            StaticCredentialProvider::new(Some("user1".to_string()), Some(String::new()));
        assert!(provider.bearer_token().await.unwrap_err().is_unauthorized());

        let anonymous = StaticCredentialProvider::default();
        assert!(anonymous.current_user_id().is_none());
        assert!(anonymous.bearer_token().await.unwrap_err().is_unauthorized());
    }
}
