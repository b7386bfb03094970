//! Container exec collaborator backed by Proxmox `pct`

use async_trait::async_trait;
use tracing::info;

use crate::errors::RelayError;
use crate::exec::command::{run_command, CommandOutcome};
use crate::provision::selector::ContainerId;

/// Runs an argument vector inside a container's namespaces
#[async_trait]
pub trait ContainerExec: Send + Sync {
    async fn exec(&self, id: &ContainerId, argv: &[String]) -> Result<CommandOutcome, RelayError>;
}

/// `pct exec <vmid> -- <argv...>`
#[derive(Debug, Clone)]
pub struct PctExec {
    program: String,
}

impl PctExec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PctExec {
    fn default() -> Self {
        Self::new("pct")
    }
}

#[async_trait]
impl ContainerExec for PctExec {
    async fn exec(&self, id: &ContainerId, argv: &[String]) -> Result<CommandOutcome, RelayError> {
        info!("pct exec {} ({} args)", id, argv.len());
        let mut args = vec!["exec".to_string(), id.to_string(), "--".to_string()];
        args.extend(argv.iter().cloned());
        run_command(&self.program, args).await
    }
}
