//! Operator intents

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::models::{ChatId, MessageRef};
use crate::utils::generate_uuid;

/// A discrete operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Deploy,
    Status,
}

impl IntentKind {
    /// Options offered by the chooser, in display order
    pub const ALL: [IntentKind; 2] = [IntentKind::Deploy, IntentKind::Status];

    pub fn label(self) -> &'static str {
        match self {
            IntentKind::Deploy => "Deploy",
            IntentKind::Status => "Status",
        }
    }

    /// Button payload for this option
    pub fn callback_data(self) -> &'static str {
        match self {
            IntentKind::Deploy => "deploy",
            IntentKind::Status => "status",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploy" => Ok(IntentKind::Deploy),
            "status" => Ok(IntentKind::Status),
            _ => Err(format!("Unknown option: {}", s)),
        }
    }
}

/// Where an intent came from; used for correlation only
#[derive(Debug, Clone)]
pub struct IntentContext {
    pub correlation_id: String,
    pub chat: Option<ChatId>,
    pub message_id: Option<i64>,
    pub received_at: DateTime<Utc>,
}

impl IntentContext {
    pub fn new(origin: Option<&MessageRef>) -> Self {
        Self {
            correlation_id: generate_uuid(),
            chat: origin.map(|m| m.chat.clone()),
            message_id: origin.map(|m| m.message_id),
            received_at: Utc::now(),
        }
    }
}

/// An intent is consumed exactly once by the dispatcher
#[derive(Debug, Clone)]
pub struct Intent {
    pub kind: IntentKind,
    pub context: IntentContext,
}

impl Intent {
    pub fn new(kind: IntentKind, origin: Option<&MessageRef>) -> Self {
        Self {
            kind,
            context: IntentContext::new(origin),
        }
    }
}
