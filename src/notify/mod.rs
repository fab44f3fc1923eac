//! Outbound chat notifications.

mod telegram;

use async_trait::async_trait;
pub use telegram::{TelegramClient, Update};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Chat API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat API error: {description}")]
    Api { description: String },
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Something that can deliver an HTML-formatted message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> NotifyResult<()>;
}
