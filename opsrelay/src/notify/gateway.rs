//! Notification gateway to the operator channel

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chat::models::{ChatId, MessageRef};
use crate::chat::transport::ChatTransport;
use crate::errors::DeliveryError;

/// Acknowledgement of a delivered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: MessageRef,
}

/// Sends free text to the configured operator channel.
///
/// Holds only the shared transport and an immutable channel id, so any number of
/// dispatch flows can call [`NotificationGateway::notify`] concurrently.
pub struct NotificationGateway {
    transport: Arc<dyn ChatTransport>,
    channel: ChatId,
}

impl NotificationGateway {
    pub fn new(transport: Arc<dyn ChatTransport>, channel: ChatId) -> Self {
        Self { transport, channel }
    }

    pub fn channel(&self) -> &ChatId {
        &self.channel
    }

    /// One outbound message, no retry
    pub async fn notify(&self, text: &str) -> Result<Ack, DeliveryError> {
        match self.transport.send_message(&self.channel, text, None).await {
            Ok(message) => {
                debug!("Notification delivered to {} (message {})", self.channel, message.message_id);
                Ok(Ack { message })
            }
            Err(e) => {
                warn!("Notification to {} failed: {}", self.channel, e);
                Err(e.into())
            }
        }
    }
}
