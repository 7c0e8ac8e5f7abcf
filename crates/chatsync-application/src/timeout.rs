//! Timer races for network calls.

use chatsync_core::error::{ChatError, Result};
use std::future::Future;
use std::time::Duration;

/// Races `future` against a timer of `duration`.
///
/// When the timer wins the future is dropped, so a late completion can
/// never be observed, and `NetworkTimeout` is returned. That is distinct
/// from any error the call itself produces.
pub async fn with_timeout<T, F>(operation: &str, duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "[timeout] {} gave no response within {:?}",
                operation,
                duration
            );
            Err(ChatError::timeout(operation, duration.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let result: Result<()> = with_timeout("chat request", Duration::from_secs(30), async {
            tokio::time::sleep(Duration::from_secs(31)).await;
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err(), ChatError::timeout("chat request", 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_error_is_not_a_timeout() {
        let result: Result<()> = with_timeout("chat request", Duration::from_secs(30), async {
            Err(ChatError::remote(Some(500), "boom"))
        })
        .await;

        assert!(matches!(result.unwrap_err(), ChatError::Remote { .. }));
    }
}
