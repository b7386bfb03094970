//! Finite state machine for a single intent

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// Dispatch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    /// Intent not yet accepted
    Idle,

    /// Privileged action in progress
    Dispatching,

    Succeeded,

    Failed,

    /// Interrupted by shutdown during the grace interval
    Cancelled,
}

impl DispatchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DispatchState::Succeeded | DispatchState::Failed | DispatchState::Cancelled
        )
    }
}

/// Dispatch event
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Accept,
    Complete,
    Fail(String),
    Cancel,
}

/// Dispatch FSM
#[derive(Debug, Clone)]
pub struct DispatchFsm {
    state: DispatchState,
    error: Option<String>,
}

impl DispatchFsm {
    pub fn new() -> Self {
        Self {
            state: DispatchState::Idle,
            error: None,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DispatchEvent) -> Result<DispatchState, RelayError> {
        let new_state = match (self.state, &event) {
            (DispatchState::Idle, DispatchEvent::Accept) => DispatchState::Dispatching,

            (DispatchState::Dispatching, DispatchEvent::Complete) => DispatchState::Succeeded,
            (DispatchState::Dispatching, DispatchEvent::Fail(err)) => {
                self.error = Some(err.clone());
                DispatchState::Failed
            }
            (DispatchState::Dispatching, DispatchEvent::Cancel) => DispatchState::Cancelled,

            // Terminal states accept nothing
            (state, event) => {
                return Err(RelayError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for DispatchFsm {
    fn default() -> Self {
        Self::new()
    }
}
