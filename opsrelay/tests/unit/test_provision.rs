//! Identity resolution and key provisioning over LXC config directories

use std::sync::Arc;

use opsrelay::errors::ProvisionError;
use opsrelay::provision::dispatcher::{ProvisioningDispatcher, DEFAULT_AUTHORIZED_KEYS};
use opsrelay::provision::resolver::IdentityResolver;
use opsrelay::provision::selector::{ContainerId, ContainerSelector, ProvisionRequest};

use crate::fakes::{lxc_config_dir, FakeContainerExec};

const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBx operator@laptop";

fn ip(value: &str) -> ContainerSelector {
    ContainerSelector::Ip(value.to_string())
}

fn hostname(value: &str) -> ContainerSelector {
    ContainerSelector::Hostname(value.to_string())
}

#[tokio::test]
async fn test_resolve_by_ip_and_hostname() {
    let dir = lxc_config_dir();
    let resolver = IdentityResolver::new(dir.path());

    assert_eq!(resolver.resolve(&ip("10.0.0.5")).await, Ok(ContainerId::new("101")));
    assert_eq!(resolver.resolve(&ip("10.0.0.6/24")).await, Ok(ContainerId::new("102")));
    assert_eq!(resolver.resolve(&hostname("db01")).await, Ok(ContainerId::new("102")));
}

#[tokio::test]
async fn test_resolve_matches_substring_case_sensitive() {
    let dir = lxc_config_dir();
    let resolver = IdentityResolver::new(dir.path());

    assert_eq!(resolver.resolve(&hostname("web")).await, Ok(ContainerId::new("101")));
    assert_eq!(resolver.resolve(&ip("0.0.6")).await, Ok(ContainerId::new("102")));

    for selector in [ip("10.0.0.50"), ip("10.0.0.5/16"), hostname("WEB01")] {
        assert!(
            matches!(resolver.resolve(&selector).await, Err(ProvisionError::NotFound(_))),
            "{} should not resolve",
            selector
        );
    }
}

#[tokio::test]
async fn test_resolve_shared_prefix_is_not_found() {
    let dir = lxc_config_dir();
    let resolver = IdentityResolver::new(dir.path());

    assert_eq!(
        resolver.resolve(&ip("10.0.0")).await,
        Err(ProvisionError::NotFound("ip 10.0.0".to_string()))
    );
    assert_eq!(
        resolver.resolve(&hostname("01")).await,
        Err(ProvisionError::NotFound("hostname 01".to_string()))
    );
}

#[tokio::test]
async fn test_resolve_ambiguous_is_not_found() {
    let dir = lxc_config_dir();
    std::fs::write(
        dir.path().join("103.conf"),
        "hostname: web01\nrootfs: local-lvm:vm-103-disk-0,size=8G\n",
    )
    .unwrap();
    let resolver = IdentityResolver::new(dir.path());

    assert_eq!(
        resolver.resolve(&hostname("web01")).await,
        Err(ProvisionError::NotFound("hostname web01".to_string()))
    );
}

#[tokio::test]
async fn test_resolve_ignores_other_files() {
    let dir = lxc_config_dir();
    std::fs::write(
        dir.path().join("notes.txt"),
        "hostname: spare\nrootfs: local-lvm:vm-200-disk-0\n",
    )
    .unwrap();
    let resolver = IdentityResolver::new(dir.path());

    assert!(resolver.resolve(&hostname("spare")).await.is_err());
}

#[tokio::test]
async fn test_resolve_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = IdentityResolver::new(dir.path().join("absent"));

    assert!(matches!(
        resolver.resolve(&ip("10.0.0.5")).await,
        Err(ProvisionError::ExecutionError { .. })
    ));
}

#[tokio::test]
async fn test_provision_by_ip_execs_append() {
    let dir = lxc_config_dir();
    let exec = Arc::new(FakeContainerExec::succeeding(""));
    let provisioner = ProvisioningDispatcher::new(
        IdentityResolver::new(dir.path()),
        exec.clone(),
        DEFAULT_AUTHORIZED_KEYS,
    );

    provisioner
        .provision(&ProvisionRequest::new(ip("10.0.0.5"), format!("  {}\n", KEY)))
        .await
        .unwrap();

    let calls = exec.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (id, argv) = &calls[0];
    assert_eq!(id, &ContainerId::new("101"));
    assert_eq!(argv[0], "sh");
    assert!(!argv[2].contains(KEY));
    assert_eq!(argv[argv.len() - 2], KEY);
    assert_eq!(argv[argv.len() - 1], DEFAULT_AUTHORIZED_KEYS);
}

#[tokio::test]
async fn test_provision_validates_before_resolving() {
    let exec = Arc::new(FakeContainerExec::succeeding(""));
    // A resolver pointing nowhere proves nothing was scanned
    let dir = tempfile::tempdir().unwrap();
    let provisioner = ProvisioningDispatcher::new(
        IdentityResolver::new(dir.path().join("absent")),
        exec.clone(),
        DEFAULT_AUTHORIZED_KEYS,
    );

    assert_eq!(
        provisioner.provision(&ProvisionRequest::new(ip("10.0.0.5"), "  ")).await,
        Err(ProvisionError::MissingKey)
    );
    assert_eq!(
        provisioner.provision(&ProvisionRequest::new(hostname(""), KEY)).await,
        Err(ProvisionError::MissingSelector)
    );
    assert_eq!(exec.call_count(), 0);
}

#[tokio::test]
async fn test_provision_unknown_ip_never_execs() {
    let dir = lxc_config_dir();
    let exec = Arc::new(FakeContainerExec::succeeding(""));
    let provisioner = ProvisioningDispatcher::new(
        IdentityResolver::new(dir.path()),
        exec.clone(),
        DEFAULT_AUTHORIZED_KEYS,
    );

    let result = provisioner
        .provision(&ProvisionRequest::new(ip("192.168.1.1"), KEY))
        .await;

    assert_eq!(result, Err(ProvisionError::NotFound("ip 192.168.1.1".to_string())));
    assert_eq!(exec.call_count(), 0);
}

#[tokio::test]
async fn test_provision_raw_id_skips_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let exec = Arc::new(FakeContainerExec::succeeding(""));
    let provisioner = ProvisioningDispatcher::new(
        IdentityResolver::new(dir.path().join("absent")),
        exec.clone(),
        DEFAULT_AUTHORIZED_KEYS,
    );

    provisioner
        .provision(&ProvisionRequest::new(ContainerSelector::RawId("205".to_string()), KEY))
        .await
        .unwrap();
    assert_eq!(exec.calls.lock().unwrap()[0].0, ContainerId::new("205"));

    let result = provisioner
        .provision(&ProvisionRequest::new(
            ContainerSelector::RawId("205; reboot".to_string()),
            KEY,
        ))
        .await;
    assert!(matches!(result, Err(ProvisionError::NotFound(_))));
    assert_eq!(exec.call_count(), 1);
}

#[tokio::test]
async fn test_provision_exec_failure_keeps_output() {
    let dir = lxc_config_dir();
    let exec = Arc::new(FakeContainerExec::failing(2, "sh: can't create /root/.ssh/authorized_keys"));
    let provisioner = ProvisioningDispatcher::new(
        IdentityResolver::new(dir.path()),
        exec,
        DEFAULT_AUTHORIZED_KEYS,
    );

    let err = provisioner
        .provision(&ProvisionRequest::new(hostname("web01"), KEY))
        .await
        .unwrap_err();

    match err {
        ProvisionError::ExecutionError {
            message,
            partial_output,
        } => {
            assert!(message.contains("pct exec 101"));
            assert!(partial_output.contains("can't create"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
