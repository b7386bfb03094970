//! Chat transport seam

use std::time::Duration;

use async_trait::async_trait;

use crate::chat::models::{ChatId, InlineKeyboardMarkup, MessageRef, Update};
use crate::errors::RelayError;

/// Message delivery and keyboard rendering of the chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageRef, RelayError>;

    async fn edit_message_text(&self, message: &MessageRef, text: &str) -> Result<(), RelayError>;

    /// Acknowledge a button press so the client stops its spinner
    async fn answer_callback(&self, callback_id: &str) -> Result<(), RelayError>;

    /// Long-poll for updates newer than `offset`
    async fn poll_updates(&self, offset: Option<i64>, timeout: Duration)
        -> Result<Vec<Update>, RelayError>;
}
