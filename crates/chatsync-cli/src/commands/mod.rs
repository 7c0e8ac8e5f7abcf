pub mod conversation;
pub mod feedback;
pub mod health;

use chatsync_core::conversation::Message;

/// One-line rendering of a message.
pub fn render_message(message: &Message) -> String {
    let who = if message.is_error {
        "error"
    } else if message.is_user {
        "you"
    } else {
        "assistant"
    };
    format!("[{}] {}  ({})", who, message.text, message.id)
}
