//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::RelayError;
use crate::logs::LogLevel;
use crate::provision::dispatcher::DEFAULT_AUTHORIZED_KEYS;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/opsrelay/settings.json";

/// Environment variable overriding the bot token
pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";

/// Environment variable overriding the operator chat
pub const CHAT_ID_ENV: &str = "CHAT_ID";

/// Relay settings, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log_json: bool,

    /// Directory for rotated log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Run the chat bot worker
    #[serde(default = "default_true")]
    pub enable_bot: bool,

    #[serde(default)]
    pub notify_server: NotifyServerSettings,

    #[serde(default)]
    pub provision_server: ProvisionServerSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    #[serde(default)]
    pub provision: ProvisionSettings,

    /// Seconds to wait for workers to stop on shutdown
    #[serde(default = "default_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_shutdown_delay() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            telegram: TelegramSettings::default(),
            enable_bot: true,
            notify_server: NotifyServerSettings::default(),
            provision_server: ProvisionServerSettings::default(),
            deploy: DeploySettings::default(),
            provision: ProvisionSettings::default(),
            max_shutdown_delay_secs: default_shutdown_delay(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is absent,
    /// then apply environment overrides.
    pub async fn load(path: &Path) -> Result<Self, RelayError> {
        let mut settings = match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                info!("Loaded settings from {}", path.display());
                Self::from_json(&contents)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_json(contents: &str) -> Result<Self, RelayError> {
        serde_json::from_str(contents)
            .map_err(|e| RelayError::ConfigError(format!("invalid settings file: {}", e)))
    }

    /// Apply `TELEGRAM_TOKEN` / `CHAT_ID` overrides from `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.is_empty()) {
            debug!("Bot token taken from {}", TOKEN_ENV);
            self.telegram.token = token;
        }
        if let Some(chat_id) = lookup(CHAT_ID_ENV).filter(|c| !c.is_empty()) {
            debug!("Operator chat taken from {}", CHAT_ID_ENV);
            self.telegram.chat_id = chat_id;
        }
    }
}

/// Chat transport settings
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot credential; moved into a secret once the client is built
    #[serde(default, skip_serializing)]
    pub token: String,

    /// Operator chat that receives notifications
    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Long-poll timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Delay before polling again after a transport failure
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_retry_delay() -> u64 {
    5
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: String::new(),
            api_base_url: default_api_base_url(),
            poll_timeout_secs: default_poll_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("chat_id", &self.chat_id)
            .field("api_base_url", &self.api_base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .finish()
    }
}

/// Notification gateway listener (`/send`); every field falls back on its own
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyServerSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for NotifyServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: 5005,
        }
    }
}

/// Provisioning listener (`/ssh`, `/ssh/vmid`); off unless enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionServerSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ProvisionServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: 5252,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Deploy / status flow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Service restarted by a Deploy intent
    #[serde(default = "default_restart_service")]
    pub restart_service: String,

    /// Service probed after the grace interval
    #[serde(default = "default_status_service")]
    pub status_service: String,

    #[serde(default = "default_grace_interval")]
    pub grace_interval_secs: u64,

    /// Lines of status output kept in a notification
    #[serde(default = "default_status_line_limit")]
    pub status_line_limit: usize,

    /// Reject a Deploy while another one for the same service is running
    #[serde(default)]
    pub single_flight: bool,

    /// Answer Status intents with a real status probe
    #[serde(default)]
    pub probe_on_status: bool,

    #[serde(default = "default_systemctl")]
    pub systemctl_path: String,
}

fn default_restart_service() -> String {
    "starter".to_string()
}

fn default_status_service() -> String {
    "deployer".to_string()
}

fn default_grace_interval() -> u64 {
    10
}

fn default_status_line_limit() -> usize {
    5
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            restart_service: default_restart_service(),
            status_service: default_status_service(),
            grace_interval_secs: default_grace_interval(),
            status_line_limit: default_status_line_limit(),
            single_flight: false,
            probe_on_status: false,
            systemctl_path: default_systemctl(),
        }
    }
}

impl DeploySettings {
    pub fn grace_interval(&self) -> Duration {
        Duration::from_secs(self.grace_interval_secs)
    }
}

/// Container provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionSettings {
    /// Directory holding one `<vmid>.conf` per container
    #[serde(default = "default_lxc_config_dir")]
    pub lxc_config_dir: PathBuf,

    #[serde(default = "default_pct")]
    pub pct_path: String,

    /// Authorized keys file inside the container
    #[serde(default = "default_authorized_keys")]
    pub authorized_keys_path: String,
}

fn default_lxc_config_dir() -> PathBuf {
    PathBuf::from("/etc/pve/lxc")
}

fn default_pct() -> String {
    "pct".to_string()
}

fn default_authorized_keys() -> String {
    DEFAULT_AUTHORIZED_KEYS.to_string()
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            lxc_config_dir: default_lxc_config_dir(),
            pct_path: default_pct(),
            authorized_keys_path: default_authorized_keys(),
        }
    }
}
