//! Service manager collaborator backed by systemd

use std::fmt;

use async_trait::async_trait;
use tracing::info;

use crate::errors::RelayError;
use crate::exec::command::{run_command, CommandOutcome};

/// A systemd unit name; bare names get the `.service` suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.contains('.') {
            Self(name)
        } else {
            Self(format!("{}.service", name))
        }
    }

    pub fn unit(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Restart,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceAction::Restart => "restart",
        }
    }
}

/// Restart and status primitives of the host's service manager
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn run_service_command(
        &self,
        service: &ServiceName,
        action: ServiceAction,
    ) -> Result<CommandOutcome, RelayError>;

    async fn query_service_status(&self, service: &ServiceName)
        -> Result<CommandOutcome, RelayError>;
}

/// `systemctl` invoked as a child process
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: String,
}

impl Systemctl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Systemctl {
    fn default() -> Self {
        Self::new("systemctl")
    }
}

#[async_trait]
impl ServiceManager for Systemctl {
    async fn run_service_command(
        &self,
        service: &ServiceName,
        action: ServiceAction,
    ) -> Result<CommandOutcome, RelayError> {
        info!("systemctl {} {}", action.as_str(), service);
        // --no-block: the job is queued and we return, even if it ends up stopping us
        run_command(
            &self.program,
            [action.as_str(), "--no-block", service.unit()],
        )
        .await
    }

    async fn query_service_status(
        &self,
        service: &ServiceName,
    ) -> Result<CommandOutcome, RelayError> {
        run_command(&self.program, ["status", "--no-pager", service.unit()]).await
    }
}
