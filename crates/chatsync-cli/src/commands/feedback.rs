use crate::bootstrap::AppBootstrap;
use anyhow::Result;
use chatsync_core::feedback::FeedbackScore;

pub async fn rate(
    app: &AppBootstrap,
    conversation_id: &str,
    message_id: &str,
    score: FeedbackScore,
) -> Result<()> {
    let user_id = app.user_id()?;
    let conversation = app
        .conversation_service()
        .load(conversation_id, &user_id)
        .await?;

    let record = app
        .feedback_service()
        .rate(conversation_id, &conversation.messages, message_id, score)
        .await?;

    println!("✓ Rated {} ({:+})", record.message_id, record.score.value());
    Ok(())
}
