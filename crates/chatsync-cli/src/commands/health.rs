use crate::bootstrap::AppBootstrap;
use crate::commands::render_message;
use anyhow::{Result, bail};
use chatsync_core::connectivity::ConnectionStatus;

pub async fn run(app: &AppBootstrap) -> Result<()> {
    let monitor = app.connection_monitor();
    let status = monitor.check_health().await;

    match status {
        ConnectionStatus::Connected => {
            println!("✓ {} is reachable", app.config.api_base());
            Ok(())
        }
        _ => bail!("{} is not reachable ({})", app.config.api_base(), status),
    }
}

/// Re-checks the backend, then re-requests the reply for the conversation's
/// unanswered message.
pub async fn retry(app: &AppBootstrap, conversation_id: &str) -> Result<()> {
    let user_id = app.user_id()?;
    let controller = app.sync_controller();
    let (state, _) = controller.switch_to(conversation_id, &user_id).await?;

    let monitor = app.connection_monitor();
    let pipeline = app.send_pipeline();
    let outcome = monitor.retry(&pipeline, Some(&state)).await;
    controller.close().await;

    if outcome.status != ConnectionStatus::Connected {
        bail!("Backend still unreachable ({})", outcome.status);
    }

    match outcome.reply {
        None => {
            println!("Nothing to retry: the last message already has a reply");
            Ok(())
        }
        Some(Ok(reply)) => {
            println!("{}", render_message(&reply));
            Ok(())
        }
        Some(Err(e)) => bail!("Retry failed: {e}"),
    }
}
