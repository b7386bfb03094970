//! Application state management

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::broadcast;
use tracing::info;

use crate::app::options::AppOptions;
use crate::chat::models::ChatId;
use crate::chat::telegram::TelegramClient;
use crate::chat::transport::ChatTransport;
use crate::dispatch::dispatcher::CommandDispatcher;
use crate::errors::RelayError;
use crate::exec::pct::{ContainerExec, PctExec};
use crate::exec::systemctl::{ServiceManager, Systemctl};
use crate::notify::gateway::NotificationGateway;
use crate::provision::dispatcher::ProvisioningDispatcher;
use crate::provision::resolver::IdentityResolver;

/// Chat side of the relay: one transport shared by the bot and the gateway
pub struct ChatState {
    pub transport: Arc<dyn ChatTransport>,
    pub gateway: Arc<NotificationGateway>,
    pub dispatcher: Arc<CommandDispatcher>,
}

/// Main application state, built once at startup
pub struct AppState {
    /// Present when the bot or the notify server is enabled
    pub chat: Option<ChatState>,

    /// Present when the provisioning server is enabled
    pub provisioner: Option<Arc<ProvisioningDispatcher>>,
}

impl AppState {
    /// Build the production collaborators: Telegram, systemctl, pct
    pub fn init(
        options: &AppOptions,
        token: SecretString,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<Self, RelayError> {
        let chat = if options.enable_bot || options.notify_server.enabled {
            let transport: Arc<dyn ChatTransport> = Arc::new(TelegramClient::new(
                &options.chat.api_base_url,
                token,
                options.bot.poll_timeout,
            )?);
            let services: Arc<dyn ServiceManager> =
                Arc::new(Systemctl::new(options.systemctl_path.as_str()));
            Some(Self::chat_state(options, transport, services, shutdown_tx)?)
        } else {
            info!("Bot and notify server disabled, no chat transport");
            None
        };

        let provisioner = if options.provision_server.enabled {
            let exec: Arc<dyn ContainerExec> =
                Arc::new(PctExec::new(options.provision.pct_path.as_str()));
            Some(Self::provisioner(options, exec))
        } else {
            None
        };

        Ok(Self { chat, provisioner })
    }

    /// Wire the chat flows around an existing transport and service manager
    pub fn chat_state(
        options: &AppOptions,
        transport: Arc<dyn ChatTransport>,
        services: Arc<dyn ServiceManager>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<ChatState, RelayError> {
        let chat_id = options.chat.chat_id.trim();
        if chat_id.is_empty() {
            return Err(RelayError::ConfigError("operator chat id is not set".to_string()));
        }

        let gateway = Arc::new(NotificationGateway::new(
            transport.clone(),
            ChatId::new(chat_id),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            gateway.clone(),
            services,
            options.dispatch.clone(),
            shutdown_tx,
        ));

        Ok(ChatState {
            transport,
            gateway,
            dispatcher,
        })
    }

    /// Wire the provisioning dispatcher around an existing container exec
    pub fn provisioner(
        options: &AppOptions,
        exec: Arc<dyn ContainerExec>,
    ) -> Arc<ProvisioningDispatcher> {
        Arc::new(ProvisioningDispatcher::new(
            IdentityResolver::new(options.provision.lxc_config_dir.clone()),
            exec,
            options.provision.authorized_keys_path.as_str(),
        ))
    }
}
