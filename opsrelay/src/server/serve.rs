//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::RelayError;
use crate::server::handlers::{
    health_handler, send_handler, ssh_handler, ssh_vmid_handler, version_handler,
};
use crate::server::state::{NotifyState, ProvisionState};

/// Routes of the notification gateway
pub fn notify_router(state: Arc<NotifyState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Notifications
        .route("/send", post(send_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Routes of the provisioning server
pub fn provision_router(state: Arc<ProvisionState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Key injection
        .route("/ssh", post(ssh_handler))
        .route("/ssh/vmid", post(ssh_vmid_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `options` and serve `app` until `shutdown_signal` resolves
pub async fn serve(
    name: &str,
    options: &ServerOptions,
    app: Router,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), RelayError>>, RelayError> {
    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting {} server on {}", name, addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::ServerError(format!("{} server on {}: {}", name, addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| RelayError::ServerError(e.to_string()))
    });

    Ok(handle)
}
