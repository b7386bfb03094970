//! Application configuration options

use std::time::Duration;

use crate::config::settings::{
    NotifyServerSettings, ProvisionServerSettings, ProvisionSettings, Settings,
};
use crate::dispatch::dispatcher::DispatchOptions;
use crate::workers::bot;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Chat transport configuration
    pub chat: ChatOptions,

    /// Run the chat bot worker
    pub enable_bot: bool,

    /// Bot worker options
    pub bot: bot::Options,

    /// Notification gateway server (`/send`)
    pub notify_server: ServerOptions,

    /// Provisioning server (`/ssh`, `/ssh/vmid`)
    pub provision_server: ServerOptions,

    /// Deploy / status flow options
    pub dispatch: DispatchOptions,

    /// `systemctl` binary used by the dispatcher
    pub systemctl_path: String,

    /// Container provisioning options
    pub provision: ProvisionSettings,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            chat: ChatOptions {
                api_base_url: settings.telegram.api_base_url.clone(),
                chat_id: settings.telegram.chat_id.clone(),
            },
            enable_bot: settings.enable_bot,
            bot: bot::Options::from(&settings.telegram),
            notify_server: ServerOptions::from(&settings.notify_server),
            provision_server: ServerOptions::from(&settings.provision_server),
            dispatch: DispatchOptions::from(&settings.deploy),
            systemctl_path: settings.deploy.systemctl_path.clone(),
            provision: settings.provision.clone(),
        }
    }
}

/// Lifecycle options for the relay
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Chat transport options; the token is passed separately as a secret
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub api_base_url: String,

    /// Operator chat receiving every notification
    pub chat_id: String,
}

/// HTTP listener options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Start this listener
    pub enabled: bool,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl From<&NotifyServerSettings> for ServerOptions {
    fn from(settings: &NotifyServerSettings) -> Self {
        Self {
            enabled: settings.enabled,
            host: settings.host.clone(),
            port: settings.port,
        }
    }
}

impl From<&ProvisionServerSettings> for ServerOptions {
    fn from(settings: &ProvisionServerSettings) -> Self {
        Self {
            enabled: settings.enabled,
            host: settings.host.clone(),
            port: settings.port,
        }
    }
}
