//! HTTP surface of the notify and provisioning servers

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::TryStreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use opsrelay::chat::models::ChatId;
use opsrelay::notify::gateway::NotificationGateway;
use opsrelay::provision::dispatcher::ProvisioningDispatcher;
use opsrelay::provision::resolver::IdentityResolver;
use opsrelay::provision::selector::ContainerId;
use opsrelay::server::serve::{notify_router, provision_router};
use opsrelay::server::state::{NotifyState, ProvisionState};

use crate::fakes::{lxc_config_dir, FakeContainerExec, Journal, RecordingTransport, OPERATOR_CHAT};

const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBx operator@laptop";

async fn call(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response
        .into_body()
        .into_data_stream()
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn notify_app(transport: Arc<RecordingTransport>) -> Router {
    let gateway = Arc::new(NotificationGateway::new(transport, ChatId::new(OPERATOR_CHAT)));
    notify_router(Arc::new(NotifyState::new(gateway)))
}

fn provision_app(dir: &std::path::Path, exec: Arc<FakeContainerExec>) -> Router {
    let provisioner = Arc::new(ProvisioningDispatcher::new(
        IdentityResolver::new(dir),
        exec,
        "/root/.ssh/authorized_keys",
    ));
    provision_router(Arc::new(ProvisionState::new(provisioner)))
}

// ==================================== SEND ====================================== //

#[tokio::test]
async fn test_send_delivers_to_operator_chat() {
    let transport = Arc::new(RecordingTransport::new(Journal::default()));

    let (status, body) = call(
        notify_app(transport.clone()),
        "/send",
        json!({ "message": "backup finished" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "Message sent successfully" }));
    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat, ChatId::new(OPERATOR_CHAT));
    assert_eq!(sent[0].text, "backup finished");
}

#[tokio::test]
async fn test_send_rejects_bad_bodies_without_delivery() {
    let transport = Arc::new(RecordingTransport::new(Journal::default()));

    for body in ["{}", r#"{"message": ""}"#, r#"{"message": 5}"#, "not json"] {
        let (status, response) = call(notify_app(transport.clone()), "/send", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
        assert_eq!(response["error"], "Invalid request data");
    }
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_send_reports_delivery_failure() {
    let transport = Arc::new(RecordingTransport::failing(Journal::default()));

    let (status, body) = call(
        notify_app(transport),
        "/send",
        json!({ "message": "disk almost full" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send message");
}

#[tokio::test]
async fn test_health() {
    let transport = Arc::new(RecordingTransport::new(Journal::default()));
    let response = notify_app(transport)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ==================================== SSH ======================================= //

#[tokio::test]
async fn test_ssh_by_ip_returns_command_output() {
    let dir = lxc_config_dir();
    let exec = Arc::new(FakeContainerExec::succeeding("key added\n"));

    let (status, body) = call(
        provision_app(dir.path(), exec.clone()),
        "/ssh",
        json!({ "ip": "10.0.0.5", "key": KEY }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "output": "key added\n" }));
    assert_eq!(exec.calls.lock().unwrap()[0].0, ContainerId::new("101"));
}

#[tokio::test]
async fn test_ssh_unknown_ip_is_404_without_exec() {
    let dir = lxc_config_dir();
    let exec = Arc::new(FakeContainerExec::succeeding(""));

    let (status, body) = call(
        provision_app(dir.path(), exec.clone()),
        "/ssh",
        json!({ "ip": "10.9.9.9", "key": KEY }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "VMID not found for ip 10.9.9.9");
    assert_eq!(exec.call_count(), 0);
}

#[tokio::test]
async fn test_ssh_missing_fields() {
    let dir = lxc_config_dir();
    let exec = Arc::new(FakeContainerExec::succeeding(""));

    let (status, body) = call(
        provision_app(dir.path(), exec.clone()),
        "/ssh",
        json!({ "hostname": "web01" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No key provided");

    let (status, body) = call(
        provision_app(dir.path(), exec.clone()),
        "/ssh",
        json!({ "key": KEY }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "IP address, hostname or VMID not provided");

    let (status, _) = call(
        provision_app(dir.path(), exec.clone()),
        "/ssh",
        json!({ "ip": "10.0.0.5", "hostname": "web01", "key": KEY }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(exec.call_count(), 0);
}

#[tokio::test]
async fn test_ssh_vmid_accepts_string_or_number() {
    let dir = tempfile::tempdir().unwrap();
    let exec = Arc::new(FakeContainerExec::succeeding("done"));

    for vmid in [json!("301"), json!(302)] {
        let (status, body) = call(
            provision_app(dir.path(), exec.clone()),
            "/ssh/vmid",
            json!({ "vmid": vmid, "key": KEY }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "done");
    }

    let calls = exec.calls.lock().unwrap();
    assert_eq!(calls[0].0, ContainerId::new("301"));
    assert_eq!(calls[1].0, ContainerId::new("302"));
}

#[tokio::test]
async fn test_ssh_vmid_exec_failure_is_500_with_output() {
    let dir = tempfile::tempdir().unwrap();
    let exec = Arc::new(FakeContainerExec::failing(255, "CT 999 does not exist"));

    let (status, body) = call(
        provision_app(dir.path(), exec),
        "/ssh/vmid",
        json!({ "vmid": "999", "key": KEY }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Command 'pct exec 999' returned non-zero exit status 255");
    assert_eq!(body["output"], "CT 999 does not exist");
}
