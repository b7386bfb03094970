//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::{AppState, ChatState};
use crate::errors::RelayError;
use crate::server::serve::{notify_router, provision_router, serve};
use crate::server::state::{NotifyState, ProvisionState};
use crate::workers::bot;

/// Run the relay until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    token: SecretString,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), RelayError> {
    info!("Initializing operator relay...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, token, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start relay: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    token: SecretString,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), RelayError> {
    let app_state = AppState::init(options, token, shutdown_tx.clone())?;

    if let Some(chat) = &app_state.chat {
        if options.enable_bot {
            init_bot_worker(options.bot.clone(), chat, shutdown_manager, shutdown_tx.subscribe())?;
        }

        if options.notify_server.enabled {
            init_notify_server(options, chat, shutdown_manager, shutdown_tx.subscribe()).await?;
        }
    }

    if let Some(provisioner) = &app_state.provisioner {
        info!("Initializing provisioning server...");
        let state = Arc::new(ProvisionState::new(provisioner.clone()));
        let mut shutdown_rx = shutdown_tx.subscribe();
        let handle = serve(
            "provisioning",
            &options.provision_server,
            provision_router(state),
            async move {
                let _ = shutdown_rx.recv().await;
            },
        )
        .await?;
        shutdown_manager.with_provision_server_handle(handle)?;
    }

    Ok(())
}

fn init_bot_worker(
    options: bot::Options,
    chat: &ChatState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RelayError> {
    info!("Initializing bot worker...");

    let transport = chat.transport.clone();
    let dispatcher = chat.dispatcher.clone();

    let bot_handle = tokio::spawn(async move {
        bot::run(
            &options,
            transport,
            dispatcher,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_bot_worker_handle(bot_handle)
}

async fn init_notify_server(
    options: &AppOptions,
    chat: &ChatState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RelayError> {
    info!("Initializing notify server...");

    let state = Arc::new(NotifyState::new(chat.gateway.clone()));
    let handle = serve("notify", &options.notify_server, notify_router(state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_notify_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    bot_worker_handle: Option<JoinHandle<()>>,
    notify_server_handle: Option<JoinHandle<Result<(), RelayError>>>,
    provision_server_handle: Option<JoinHandle<Result<(), RelayError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            bot_worker_handle: None,
            notify_server_handle: None,
            provision_server_handle: None,
        }
    }

    pub fn with_bot_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), RelayError> {
        if self.bot_worker_handle.is_some() {
            return Err(RelayError::ShutdownError("bot_handle already set".to_string()));
        }
        self.bot_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_notify_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), RelayError>>,
    ) -> Result<(), RelayError> {
        if self.notify_server_handle.is_some() {
            return Err(RelayError::ShutdownError("notify_server_handle already set".to_string()));
        }
        self.notify_server_handle = Some(handle);
        Ok(())
    }

    pub fn with_provision_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), RelayError>>,
    ) -> Result<(), RelayError> {
        if self.provision_server_handle.is_some() {
            return Err(RelayError::ShutdownError(
                "provision_server_handle already set".to_string(),
            ));
        }
        self.provision_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), RelayError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), RelayError> {
        info!("Shutting down operator relay...");

        // 1. Bot worker, so no new intents arrive
        if let Some(handle) = self.bot_worker_handle.take() {
            handle.await.map_err(|e| RelayError::ShutdownError(e.to_string()))?;
        }

        // 2. Notify server
        if let Some(handle) = self.notify_server_handle.take() {
            handle.await.map_err(|e| RelayError::ShutdownError(e.to_string()))??;
        }

        // 3. Provisioning server
        if let Some(handle) = self.provision_server_handle.take() {
            handle.await.map_err(|e| RelayError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
