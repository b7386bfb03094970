//! In-memory collaborators shared by the integration tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use opsrelay::chat::models::{ChatId, InlineKeyboardMarkup, MessageRef, Update};
use opsrelay::chat::transport::ChatTransport;
use opsrelay::errors::RelayError;
use opsrelay::exec::command::CommandOutcome;
use opsrelay::exec::pct::ContainerExec;
use opsrelay::exec::systemctl::{ServiceAction, ServiceManager, ServiceName};
use opsrelay::provision::selector::ContainerId;

pub const OPERATOR_CHAT: &str = "-1001";

/// Ordered record of every side effect, across all fakes of one test
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<(String, Instant)>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push((entry.into(), Instant::now()));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn time_of(&self, prefix: &str) -> Option<Instant> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(e, _)| e.starts_with(prefix))
            .map(|(_, at)| *at)
    }
}

// ================================ TRANSPORT ===================================== //

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat: ChatId,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Records sends and edits; optionally refuses every send
#[derive(Default)]
pub struct RecordingTransport {
    pub journal: Journal,
    pub sent: Mutex<Vec<SentMessage>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub answered: Mutex<Vec<String>>,
    pub updates: Mutex<VecDeque<Result<Vec<Update>, RelayError>>>,
    pub fail_sends: bool,
    next_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            journal,
            fail_sends: true,
            ..Default::default()
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageRef, RelayError> {
        self.journal.push(format!("send:{}", text));
        if self.fail_sends {
            return Err(RelayError::TransportError("Bad Request: chat not found".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat: chat.clone(),
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(MessageRef {
            chat: chat.clone(),
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn edit_message_text(&self, message: &MessageRef, text: &str) -> Result<(), RelayError> {
        self.journal.push(format!("edit:{}", text));
        self.edits.lock().unwrap().push((message.clone(), text.to_string()));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), RelayError> {
        self.journal.push(format!("answer:{}", callback_id));
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn poll_updates(
        &self,
        _offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, RelayError> {
        let next = self.updates.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }
}

// ============================== SERVICE MANAGER ================================= //

/// Records service calls and answers status queries with a canned outcome
pub struct FakeServiceManager {
    pub journal: Journal,
    pub restart_outcome: Result<CommandOutcome, String>,
    pub status_outcome: Result<CommandOutcome, String>,
    pub restarted: Notify,
}

impl FakeServiceManager {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            restart_outcome: Ok(CommandOutcome {
                exit_code: Some(0),
                ..Default::default()
            }),
            status_outcome: Ok(CommandOutcome {
                exit_code: Some(0),
                stdout: "● deployer.service - Deployer\n   Active: active (running)\n".to_string(),
                stderr: String::new(),
            }),
            restarted: Notify::new(),
        }
    }

    pub fn with_restart_exit(mut self, code: i32, stderr: impl Into<String>) -> Self {
        self.restart_outcome = Ok(CommandOutcome {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        });
        self
    }

    pub fn with_restart_error(mut self, error: impl Into<String>) -> Self {
        self.restart_outcome = Err(error.into());
        self
    }

    pub fn with_status_error(mut self, error: impl Into<String>) -> Self {
        self.status_outcome = Err(error.into());
        self
    }

    pub fn with_status_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.status_outcome = Ok(CommandOutcome {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        });
        self
    }

    pub fn with_status_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.status_outcome = Ok(CommandOutcome {
            exit_code: Some(4),
            stdout: String::new(),
            stderr: stderr.into(),
        });
        self
    }
}

#[async_trait]
impl ServiceManager for FakeServiceManager {
    async fn run_service_command(
        &self,
        service: &ServiceName,
        action: ServiceAction,
    ) -> Result<CommandOutcome, RelayError> {
        self.journal.push(format!("{}:{}", action.as_str(), service.unit()));
        self.restarted.notify_one();
        self.restart_outcome.clone().map_err(RelayError::ExecutionError)
    }

    async fn query_service_status(
        &self,
        service: &ServiceName,
    ) -> Result<CommandOutcome, RelayError> {
        self.journal.push(format!("status:{}", service.unit()));
        self.status_outcome.clone().map_err(RelayError::ExecutionError)
    }
}

// =============================== CONTAINER EXEC ================================= //

/// Records exec calls and returns a canned outcome
pub struct FakeContainerExec {
    pub calls: Mutex<Vec<(ContainerId, Vec<String>)>>,
    pub outcome: CommandOutcome,
}

impl FakeContainerExec {
    pub fn succeeding(stdout: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: CommandOutcome {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        }
    }

    pub fn failing(code: i32, stderr: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: CommandOutcome {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContainerExec for FakeContainerExec {
    async fn exec(&self, id: &ContainerId, argv: &[String]) -> Result<CommandOutcome, RelayError> {
        self.calls.lock().unwrap().push((id.clone(), argv.to_vec()));
        Ok(self.outcome.clone())
    }
}

// ================================ LXC CONFIGS =================================== //

/// A config directory with containers 101 (web01, 10.0.0.5) and 102 (db01, 10.0.0.6)
pub fn lxc_config_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("101.conf"),
        "hostname: web01\n\
         net0: name=eth0,bridge=vmbr0,ip=10.0.0.5/24,type=veth\n\
         rootfs: local-lvm:vm-101-disk-0,size=8G\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("102.conf"),
        "hostname: db01\n\
         net0: name=eth0,bridge=vmbr0,ip=10.0.0.6/24,type=veth\n\
         rootfs: local-zfs:subvol-102-disk-0,size=16G\n",
    )
    .unwrap();
    dir
}
