//! Command dispatcher: operator intents to privileged actions and notifications

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::settings::DeploySettings;
use crate::dispatch::fsm::{DispatchEvent, DispatchFsm, DispatchState};
use crate::dispatch::intent::{Intent, IntentKind};
use crate::dispatch::single_flight::SingleFlight;
use crate::exec::systemctl::{ServiceAction, ServiceManager, ServiceName};
use crate::notify::gateway::NotificationGateway;
use crate::utils::truncate_lines;

/// Announcement sent before the restart is issued
pub const RESTARTING_TEXT: &str = "SYSTEM RESTARTING";

/// Reply to a Status intent when no probe is wired
pub const STATUS_PLACEHOLDER: &str = "System status: ...";

/// Dispatcher options
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub restart_service: ServiceName,
    pub status_service: ServiceName,

    /// Wait between restart and status probe
    pub grace_interval: Duration,

    pub status_line_limit: usize,
    pub single_flight: bool,
    pub probe_on_status: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&DeploySettings::default())
    }
}

impl From<&DeploySettings> for DispatchOptions {
    fn from(settings: &DeploySettings) -> Self {
        Self {
            restart_service: ServiceName::new(settings.restart_service.as_str()),
            status_service: ServiceName::new(settings.status_service.as_str()),
            grace_interval: settings.grace_interval(),
            status_line_limit: settings.status_line_limit,
            single_flight: settings.single_flight,
            probe_on_status: settings.probe_on_status,
        }
    }
}

/// What happened to one intent
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub correlation_id: String,
    pub kind: IntentKind,
    pub state: DispatchState,
    pub error: Option<String>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

/// Runs each intent as an independent task.
///
/// Delivery failures are logged and never stop a flow; command failures end up in
/// notification text. Nothing is returned to the chat transport as an error.
pub struct CommandDispatcher {
    gateway: Arc<NotificationGateway>,
    services: Arc<dyn ServiceManager>,
    options: DispatchOptions,
    flights: SingleFlight,
    shutdown_tx: broadcast::Sender<()>,
}

impl CommandDispatcher {
    pub fn new(
        gateway: Arc<NotificationGateway>,
        services: Arc<dyn ServiceManager>,
        options: DispatchOptions,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            gateway,
            services,
            options,
            flights: SingleFlight::new(),
            shutdown_tx,
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Process `intent` on its own task.
    ///
    /// The shutdown subscription is taken before the task starts, so a shutdown
    /// broadcast at any later point reaches the flow.
    pub fn spawn(self: &Arc<Self>, intent: Intent) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.run_flow(intent, shutdown_rx).await })
    }

    pub async fn dispatch(&self, intent: Intent) -> DispatchReport {
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.run_flow(intent, shutdown_rx).await
    }

    async fn run_flow(&self, intent: Intent, shutdown_rx: broadcast::Receiver<()>) -> DispatchReport {
        let mut flow = Flow::new(&self.gateway, &intent);
        info!(
            correlation_id = %flow.correlation_id,
            intent = %intent.kind,
            chat = ?intent.context.chat,
            "Dispatching intent"
        );
        flow.transition(DispatchEvent::Accept);

        match intent.kind {
            IntentKind::Deploy => self.deploy(&mut flow, shutdown_rx).await,
            IntentKind::Status => self.status(&mut flow).await,
        }

        let report = flow.into_report(intent.kind);
        info!(
            correlation_id = %report.correlation_id,
            state = ?report.state,
            sent = report.notifications_sent,
            failed = report.notifications_failed,
            elapsed_ms = (Utc::now() - intent.context.received_at).num_milliseconds(),
            "Intent finished"
        );
        report
    }

    async fn deploy(&self, flow: &mut Flow<'_>, mut shutdown_rx: broadcast::Receiver<()>) {
        let restart = &self.options.restart_service;

        let _flight = if self.options.single_flight {
            match self.flights.try_acquire(restart) {
                Some(guard) => Some(guard),
                None => {
                    warn!("Deploy of {} already in flight, rejecting", restart);
                    flow.notify(&format!("Deploy already in progress for {}", restart)).await;
                    flow.transition(DispatchEvent::Fail(format!("{} busy", restart)));
                    return;
                }
            }
        } else {
            None
        };

        // The restart may take this process down, so announce first
        flow.notify(RESTARTING_TEXT).await;

        match self
            .services
            .run_service_command(restart, ServiceAction::Restart)
            .await
        {
            Ok(outcome) if !outcome.success() => {
                warn!(
                    "Restart of {} returned {}: {}",
                    restart,
                    outcome.describe_exit(),
                    outcome.stderr.trim()
                );
            }
            Ok(_) => info!("Restart of {} issued", restart),
            Err(e) => warn!("Restart of {} could not be issued: {}", restart, e),
        }

        tokio::select! {
            _ = tokio::time::sleep(self.options.grace_interval) => {}
            _ = shutdown_rx.recv() => {
                warn!("Shutdown during grace interval, skipping status probe");
                flow.transition(DispatchEvent::Cancel);
                return;
            }
        }

        let service = &self.options.status_service;
        match self.probe(service).await {
            Ok(status) => {
                flow.notify(&format!("{} status:\n{}", service, status)).await;
                flow.transition(DispatchEvent::Complete);
            }
            Err(err) => {
                flow.notify(&format!("Error checking {} status: {}", service, err)).await;
                flow.transition(DispatchEvent::Fail(err));
            }
        }
    }

    async fn status(&self, flow: &mut Flow<'_>) {
        if !self.options.probe_on_status {
            flow.notify(STATUS_PLACEHOLDER).await;
            flow.transition(DispatchEvent::Complete);
            return;
        }

        let service = &self.options.status_service;
        match self.probe(service).await {
            Ok(status) => {
                flow.notify(&format!("System status:\n{}", status)).await;
                flow.transition(DispatchEvent::Complete);
            }
            Err(err) => {
                flow.notify(&format!("Error checking {} status: {}", service, err)).await;
                flow.transition(DispatchEvent::Fail(err));
            }
        }
    }

    /// Truncated status text, or the error text when the probe wrote to stderr
    async fn probe(&self, service: &ServiceName) -> Result<String, String> {
        match self.services.query_service_status(service).await {
            Ok(outcome) if outcome.stderr.trim().is_empty() => {
                Ok(truncate_lines(&outcome.stdout, self.options.status_line_limit))
            }
            Ok(outcome) => Err(outcome.stderr.trim().to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Book-keeping for one intent
struct Flow<'a> {
    gateway: &'a NotificationGateway,
    correlation_id: String,
    fsm: DispatchFsm,
    sent: usize,
    failed: usize,
}

impl<'a> Flow<'a> {
    fn new(gateway: &'a NotificationGateway, intent: &Intent) -> Self {
        Self {
            gateway,
            correlation_id: intent.context.correlation_id.clone(),
            fsm: DispatchFsm::new(),
            sent: 0,
            failed: 0,
        }
    }

    async fn notify(&mut self, text: &str) {
        match self.gateway.notify(text).await {
            Ok(_) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                error!(correlation_id = %self.correlation_id, "{}", e);
            }
        }
    }

    fn transition(&mut self, event: DispatchEvent) {
        if let Err(e) = self.fsm.process(event) {
            error!(correlation_id = %self.correlation_id, "{}", e);
        }
    }

    fn into_report(self, kind: IntentKind) -> DispatchReport {
        DispatchReport {
            correlation_id: self.correlation_id,
            kind,
            state: self.fsm.state(),
            error: self.fsm.error().map(str::to_string),
            notifications_sent: self.sent,
            notifications_failed: self.failed,
        }
    }
}
