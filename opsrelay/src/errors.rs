//! Error types for the operator relay

use http::StatusCode;
use thiserror::Error;

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Chat transport error: {0}")]
    TransportError(String),

    #[error("Command execution error: {0}")]
    ExecutionError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Internal(err.to_string())
    }
}

/// The notification transport refused or failed to deliver a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

impl From<RelayError> for DeliveryError {
    fn from(err: RelayError) -> Self {
        DeliveryError(err.to_string())
    }
}

/// Failures of a key provisioning request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("No key provided")]
    MissingKey,

    #[error("IP address, hostname or VMID not provided")]
    MissingSelector,

    #[error("VMID not found for {0}")]
    NotFound(String),

    #[error("{message}")]
    ExecutionError {
        message: String,
        partial_output: String,
    },
}

impl ProvisionError {
    /// HTTP status reported to the provisioning caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProvisionError::MissingKey | ProvisionError::MissingSelector => {
                StatusCode::BAD_REQUEST
            }
            ProvisionError::NotFound(_) => StatusCode::NOT_FOUND,
            ProvisionError::ExecutionError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
