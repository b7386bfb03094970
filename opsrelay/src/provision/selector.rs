//! Container selectors and provisioning requests

use std::fmt;

/// Identifier of a container on the hypervisor (the Proxmox VMID)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the caller identifies the target container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerSelector {
    RawId(String),
    Ip(String),
    Hostname(String),
}

impl ContainerSelector {
    pub fn value(&self) -> &str {
        match self {
            ContainerSelector::RawId(v)
            | ContainerSelector::Ip(v)
            | ContainerSelector::Hostname(v) => v,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value().trim().is_empty()
    }
}

impl fmt::Display for ContainerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerSelector::RawId(v) => write!(f, "vmid {}", v),
            ContainerSelector::Ip(v) => write!(f, "ip {}", v),
            ContainerSelector::Hostname(v) => write!(f, "hostname {}", v),
        }
    }
}

/// A request to append a public key to a container's authorized keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub selector: ContainerSelector,
    pub public_key: String,
}

impl ProvisionRequest {
    pub fn new(selector: ContainerSelector, public_key: impl Into<String>) -> Self {
        Self {
            selector,
            public_key: public_key.into(),
        }
    }
}
