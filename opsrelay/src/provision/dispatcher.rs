//! Key provisioning: validate, resolve, inject

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::ProvisionError;
use crate::exec::command::CommandOutcome;
use crate::exec::pct::ContainerExec;
use crate::provision::resolver::IdentityResolver;
use crate::provision::selector::{ContainerId, ContainerSelector, ProvisionRequest};

/// Default authorized keys file inside a container
pub const DEFAULT_AUTHORIZED_KEYS: &str = "/root/.ssh/authorized_keys";

/// Appends `$1` as one line to the file named by `$2`
const APPEND_LINE_SCRIPT: &str = r#"printf '%s\n' "$1" >> "$2""#;

pub struct ProvisioningDispatcher {
    resolver: IdentityResolver,
    exec: Arc<dyn ContainerExec>,
    authorized_keys_path: String,
}

impl ProvisioningDispatcher {
    pub fn new(
        resolver: IdentityResolver,
        exec: Arc<dyn ContainerExec>,
        authorized_keys_path: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            exec,
            authorized_keys_path: authorized_keys_path.into(),
        }
    }

    /// Validate the request, resolve its container and append the key.
    ///
    /// Nothing is resolved or executed unless both key and selector are present,
    /// and nothing is executed unless the selector resolved to exactly one container.
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<CommandOutcome, ProvisionError> {
        let key = request.public_key.trim();
        if key.is_empty() {
            return Err(ProvisionError::MissingKey);
        }
        if request.selector.is_empty() {
            return Err(ProvisionError::MissingSelector);
        }

        let id = match &request.selector {
            ContainerSelector::RawId(id) => {
                let id = id.trim();
                if !id.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ProvisionError::NotFound(request.selector.to_string()));
                }
                ContainerId::new(id)
            }
            selector => self.resolver.resolve(selector).await?,
        };

        info!("Injecting SSH key into container {} ({})", id, request.selector);
        let argv = append_key_argv(key, &self.authorized_keys_path);

        let outcome = self.exec.exec(&id, &argv).await.map_err(|e| {
            error!("Exec into container {} failed: {}", id, e);
            ProvisionError::ExecutionError {
                message: e.to_string(),
                partial_output: String::new(),
            }
        })?;

        if !outcome.success() {
            error!("Key injection into container {} failed with {}", id, outcome.describe_exit());
            return Err(ProvisionError::ExecutionError {
                message: format!(
                    "Command 'pct exec {}' returned non-zero {}",
                    id,
                    outcome.describe_exit()
                ),
                partial_output: outcome.combined_output(),
            });
        }

        info!("SSH key added to container {}", id);
        Ok(outcome)
    }
}

/// The argument vector that appends `key` to `path`.
///
/// Key and path are positional parameters of the script, never part of it.
pub fn append_key_argv(key: &str, path: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        APPEND_LINE_SCRIPT.to_string(),
        "sh".to_string(),
        key.to_string(),
        path.to_string(),
    ]
}
