//! Chat bot worker: chooser rendering and intent intake

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chat::models::{CallbackQuery, InlineKeyboardMarkup, Message, Update};
use crate::chat::transport::ChatTransport;
use crate::config::settings::TelegramSettings;
use crate::dispatch::dispatcher::{CommandDispatcher, DispatchReport};
use crate::dispatch::intent::{Intent, IntentKind};

/// Prompt shown above the chooser
pub const CHOOSER_PROMPT: &str = "Please choose:";

/// Bot worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Long-poll timeout
    pub poll_timeout: Duration,

    /// Delay after a failed poll
    pub retry_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&TelegramSettings> for Options {
    fn from(settings: &TelegramSettings) -> Self {
        Self {
            poll_timeout: Duration::from_secs(settings.poll_timeout_secs),
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
        }
    }
}

/// The two-button Deploy / Status chooser
pub fn chooser_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::single_column(
        IntentKind::ALL
            .iter()
            .map(|kind| (kind.label(), kind.callback_data())),
    )
}

/// Run the bot worker
pub async fn run<S, F>(
    options: &Options,
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<CommandDispatcher>,
    sleep_fn: S,
    mut shutdown_signal: BoxFuture<'static, ()>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Bot worker starting...");

    let mut offset: Option<i64> = None;

    loop {
        let result = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Bot worker shutting down...");
                return;
            }
            result = transport.poll_updates(offset, options.poll_timeout) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    handle_update(transport.as_ref(), &dispatcher, update).await;
                }
            }
            Err(e) => {
                error!("Failed to poll chat updates: {}", e);
                tokio::select! {
                    _ = &mut shutdown_signal => {
                        info!("Bot worker shutting down...");
                        return;
                    }
                    _ = sleep_fn(options.retry_delay) => {}
                }
            }
        }
    }
}

/// Handle one update; returns the spawned dispatch task for button presses
pub async fn handle_update(
    transport: &dyn ChatTransport,
    dispatcher: &Arc<CommandDispatcher>,
    update: Update,
) -> Option<JoinHandle<DispatchReport>> {
    if let Some(query) = update.callback_query {
        return handle_callback(transport, dispatcher, query).await;
    }

    if let Some(message) = update.message {
        handle_message(transport, message).await;
    }
    None
}

/// `/start` and any plain text get the chooser
async fn handle_message(transport: &dyn ChatTransport, message: Message) {
    if message.text.is_none() {
        debug!("Ignoring non-text message {}", message.message_id);
        return;
    }

    let chat = message.message_ref().chat;
    let keyboard = chooser_keyboard();
    if let Err(e) = transport.send_message(&chat, CHOOSER_PROMPT, Some(&keyboard)).await {
        error!("Failed to send chooser to {}: {}", chat, e);
    }
}

async fn handle_callback(
    transport: &dyn ChatTransport,
    dispatcher: &Arc<CommandDispatcher>,
    query: CallbackQuery,
) -> Option<JoinHandle<DispatchReport>> {
    if let Err(e) = transport.answer_callback(&query.id).await {
        warn!("Failed to answer callback {}: {}", query.id, e);
    }

    let origin = query.message.as_ref().map(Message::message_ref);
    let data = query.data.as_deref().unwrap_or_default();

    let (echo, kind) = match data.parse::<IntentKind>() {
        Ok(kind) => (format!("Selected option: {}", kind), Some(kind)),
        Err(unknown) => {
            warn!("Ignoring callback {}: {}", query.id, unknown);
            (unknown, None)
        }
    };

    // Echo the selection before the flow starts
    if let Some(origin) = &origin {
        if let Err(e) = transport.edit_message_text(origin, &echo).await {
            warn!("Failed to update chooser message: {}", e);
        }
    }

    kind.map(|kind| dispatcher.spawn(Intent::new(kind, origin.as_ref())))
}
