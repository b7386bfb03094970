//! Privileged command execution

use std::ffi::OsStr;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

use crate::errors::RelayError;

/// Result of a privileged external command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, the way a terminal would show them
    pub fn combined_output(&self) -> String {
        let mut output = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&self.stderr);
        }
        output
    }

    pub fn describe_exit(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `program` with an argument vector and capture its output.
///
/// Arguments are handed to the process as-is; nothing goes through a shell.
pub async fn run_command<I, S>(program: &str, args: I) -> Result<CommandOutcome, RelayError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("Running command: {:?}", command.as_std());

    let output = command
        .output()
        .await
        .map_err(|e| RelayError::ExecutionError(format!("failed to run {}: {}", program, e)))?;

    Ok(CommandOutcome {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
