//! Server state

use std::sync::Arc;

use crate::notify::gateway::NotificationGateway;
use crate::provision::dispatcher::ProvisioningDispatcher;

/// State of the notify server (`/send`)
pub struct NotifyState {
    pub gateway: Arc<NotificationGateway>,
}

impl NotifyState {
    pub fn new(gateway: Arc<NotificationGateway>) -> Self {
        Self { gateway }
    }
}

/// State of the provisioning server (`/ssh`, `/ssh/vmid`)
pub struct ProvisionState {
    pub provisioner: Arc<ProvisioningDispatcher>,
}

impl ProvisionState {
    pub fn new(provisioner: Arc<ProvisioningDispatcher>) -> Self {
        Self { provisioner }
    }
}
