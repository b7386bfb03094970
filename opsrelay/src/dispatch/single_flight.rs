//! Per-service single-flight guard for Deploy intents

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::exec::systemctl::ServiceName;

/// Tracks services with a Deploy in flight
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<ServiceName>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `service`; `None` while another holder is still in flight
    pub fn try_acquire(&self, service: &ServiceName) -> Option<FlightGuard> {
        if !lock(&self.in_flight).insert(service.clone()) {
            return None;
        }
        Some(FlightGuard {
            in_flight: self.in_flight.clone(),
            service: service.clone(),
        })
    }
}

/// Releases the service when dropped
#[derive(Debug)]
pub struct FlightGuard {
    in_flight: Arc<Mutex<HashSet<ServiceName>>>,
    service: ServiceName,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.service);
    }
}

fn lock(set: &Mutex<HashSet<ServiceName>>) -> MutexGuard<'_, HashSet<ServiceName>> {
    // the set stays consistent even if a holder panicked
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
