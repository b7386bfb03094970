//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::errors::ProvisionError;
use crate::provision::selector::{ContainerSelector, ProvisionRequest};
use crate::server::state::{NotifyState, ProvisionState};
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "opsrelay".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Error body; `output` only for execution failures
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            output: None,
        }),
    )
        .into_response()
}

// ================================== NOTIFY ====================================== //

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: String,
}

/// Forward a message to the operator channel
pub async fn send_handler(
    State(state): State<Arc<NotifyState>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let message = match payload {
        Ok(Json(SendRequest {
            message: Some(message),
        })) if !message.is_empty() => message,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid request data"),
        Err(rejection) => {
            warn!("Rejected /send body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, "Invalid request data");
        }
    };

    match state.gateway.notify(&message).await {
        Ok(_) => Json(SendResponse {
            status: "Message sent successfully".to_string(),
        })
        .into_response(),
        Err(e) => {
            error!("Error sending message: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send message")
        }
    }
}

// ================================= PROVISION ==================================== //

#[derive(Debug, Deserialize)]
pub struct SshRequest {
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub key: Option<String>,
}

/// A VMID sent either as a JSON string or a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Vmid {
    Text(String),
    Number(u64),
}

impl Vmid {
    fn into_string(self) -> String {
        match self {
            Vmid::Text(text) => text,
            Vmid::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VmidRequest {
    pub vmid: Option<Vmid>,
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OutputResponse {
    pub output: String,
}

/// Inject a key into the container owning an IP or hostname
pub async fn ssh_handler(
    State(state): State<Arc<ProvisionState>>,
    payload: Result<Json<SshRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected /ssh body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let present = |field: Option<String>| field.filter(|v| !v.trim().is_empty());
    let selector = match (present(body.ip), present(body.hostname)) {
        (Some(ip), None) => ContainerSelector::Ip(ip),
        (None, Some(hostname)) => ContainerSelector::Hostname(hostname),
        (Some(_), Some(_)) => {
            return error_response(StatusCode::BAD_REQUEST, "Provide either ip or hostname, not both")
        }
        // empty selector: provision reports the missing field, key first
        (None, None) => ContainerSelector::Ip(String::new()),
    };

    provision(&state, ProvisionRequest::new(selector, body.key.unwrap_or_default())).await
}

/// Inject a key into a container addressed by VMID
pub async fn ssh_vmid_handler(
    State(state): State<Arc<ProvisionState>>,
    payload: Result<Json<VmidRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected /ssh/vmid body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let vmid = body.vmid.map(Vmid::into_string).unwrap_or_default();
    provision(
        &state,
        ProvisionRequest::new(ContainerSelector::RawId(vmid), body.key.unwrap_or_default()),
    )
    .await
}

async fn provision(state: &ProvisionState, request: ProvisionRequest) -> Response {
    match state.provisioner.provision(&request).await {
        Ok(outcome) => {
            info!("Provisioned key for {}", request.selector);
            Json(OutputResponse {
                output: outcome.combined_output(),
            })
            .into_response()
        }
        Err(e) => {
            warn!("Provisioning for {} failed: {}", request.selector, e);
            let status = e.status_code();
            let output = match &e {
                ProvisionError::ExecutionError { partial_output, .. } => {
                    Some(partial_output.clone())
                }
                _ => None,
            };
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                    output,
                }),
            )
                .into_response()
        }
    }
}
