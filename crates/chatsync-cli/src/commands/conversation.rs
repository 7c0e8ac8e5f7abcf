use crate::bootstrap::AppBootstrap;
use crate::commands::render_message;
use anyhow::{Context, Result, bail};
use chatsync_application::{ConversationTarget, SyncEvent};
use chatsync_core::conversation::Conversation;

pub async fn send(app: &AppBootstrap, conversation: &str, text: &str) -> Result<()> {
    let pipeline = app.send_pipeline();
    let target = ConversationTarget::parse(conversation);

    let outcome = pipeline.send(&target, text, None).await?;

    if let Some(id) = &outcome.redirect_to {
        println!("✓ Started conversation {}", id);
    }
    println!("{}", render_message(&outcome.user_message));
    match outcome.reply {
        Ok(reply) => {
            println!("{}", render_message(&reply));
            Ok(())
        }
        Err(e) => {
            let hint = if e.is_retryable() {
                format!(" (run `chatsync retry {}`)", outcome.conversation_id)
            } else {
                String::new()
            };
            bail!("No reply: {e}{hint}")
        }
    }
}

fn print_conversation(conversation: &Conversation) {
    let mut flags = Vec::new();
    if conversation.pinned {
        flags.push("pinned");
    }
    if conversation.archived {
        flags.push("archived");
    }
    if flags.is_empty() {
        println!("# {}", conversation.title);
    } else {
        println!("# {} [{}]", conversation.title, flags.join(", "));
    }
    for message in &conversation.messages {
        println!("{}", render_message(message));
    }
}

pub async fn show(app: &AppBootstrap, conversation_id: &str, follow: bool) -> Result<()> {
    let user_id = app.user_id()?;

    if !follow {
        let conversation = app
            .conversation_service()
            .load(conversation_id, &user_id)
            .await?;
        print_conversation(&conversation);
        return Ok(());
    }

    let controller = app.sync_controller();
    let (_, events) = controller.switch_to(conversation_id, &user_id).await?;
    let mut events = events.context("Conversation already open")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(SyncEvent::Loaded(conversation)) => print_conversation(&conversation),
                Some(SyncEvent::Updated(conversation)) => {
                    println!();
                    print_conversation(&conversation);
                }
                Some(SyncEvent::NotFound) => {
                    controller.close().await;
                    bail!("Conversation {} is no longer available", conversation_id);
                }
                None => break,
            },
        }
    }

    controller.close().await;
    Ok(())
}

pub async fn list(app: &AppBootstrap, include_archived: bool, json: bool) -> Result<()> {
    let user_id = app.user_id()?;
    let summaries = app
        .conversation_service()
        .list_for_user(&user_id, include_archived)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No conversations");
        return Ok(());
    }
    for summary in summaries {
        let marker = match (summary.pinned, summary.archived) {
            (_, true) => "A",
            (true, false) => "*",
            (false, false) => " ",
        };
        println!(
            "{} {:<22} {:<34} {:>4} msgs  {}",
            marker, summary.id, summary.title, summary.message_count, summary.updated_at
        );
    }
    Ok(())
}

pub async fn rename(app: &AppBootstrap, conversation_id: &str, title: &str) -> Result<()> {
    let user_id = app.user_id()?;
    app.conversation_service()
        .rename(conversation_id, &user_id, title)
        .await?;
    println!("✓ Renamed {}", conversation_id);
    Ok(())
}

pub async fn pin(app: &AppBootstrap, conversation_id: &str, pinned: bool) -> Result<()> {
    let user_id = app.user_id()?;
    app.conversation_service()
        .set_pinned(conversation_id, &user_id, pinned)
        .await?;
    println!(
        "✓ {} {}",
        if pinned { "Pinned" } else { "Unpinned" },
        conversation_id
    );
    Ok(())
}

pub async fn archive(app: &AppBootstrap, conversation_id: &str, archived: bool) -> Result<()> {
    let user_id = app.user_id()?;
    app.conversation_service()
        .set_archived(conversation_id, &user_id, archived)
        .await?;
    println!(
        "✓ {} {}",
        if archived { "Archived" } else { "Unarchived" },
        conversation_id
    );
    Ok(())
}

pub async fn delete(app: &AppBootstrap, conversation_id: &str) -> Result<()> {
    let user_id = app.user_id()?;
    app.conversation_service()
        .delete(conversation_id, &user_id)
        .await?;
    println!("✓ Deleted {}", conversation_id);
    Ok(())
}
