//! Telegram Bot API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, error};
use url::Url;

use crate::chat::models::{ApiResponse, ChatId, InlineKeyboardMarkup, Message, MessageRef, Update};
use crate::chat::transport::ChatTransport;
use crate::errors::RelayError;

/// Slack on top of the long-poll timeout before the HTTP request gives up
const REQUEST_SLACK: Duration = Duration::from_secs(10);

/// Process-wide Telegram client, built once at startup
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl TelegramClient {
    pub fn new(
        base_url: &str,
        token: SecretString,
        poll_timeout: Duration,
    ) -> Result<Self, RelayError> {
        if token.expose_secret().is_empty() {
            return Err(RelayError::ConfigError("bot token is not set".to_string()));
        }
        Url::parse(base_url)
            .map_err(|e| RelayError::ConfigError(format!("invalid Telegram API URL: {}", e)))?;

        let client = Client::builder()
            .timeout(poll_timeout + REQUEST_SLACK)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Call a Bot API method. The URL embeds the token, so it never reaches the logs.
    async fn call<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, RelayError> {
        debug!("Telegram {}", method);
        let url = format!("{}/bot{}/{}", self.base_url, self.token.expose_secret(), method);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::TransportError(e.without_url().to_string()))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| RelayError::TransportError(e.without_url().to_string()))?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => {
                let description = description.unwrap_or_else(|| "no description".to_string());
                error!("Telegram {} failed: {} - {}", method, status, description);
                Err(RelayError::TransportError(format!(
                    "{} failed: {} - {}",
                    method, status, description
                )))
            }
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageRef, RelayError> {
        let mut body = json!({ "chat_id": chat, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        let message: Message = self.call("sendMessage", &body).await?;
        Ok(message.message_ref())
    }

    async fn edit_message_text(&self, message: &MessageRef, text: &str) -> Result<(), RelayError> {
        let body = json!({
            "chat_id": message.chat,
            "message_id": message.message_id,
            "text": text,
        });
        // returns the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), RelayError> {
        let body = json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn poll_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, RelayError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body).await
    }
}
