//! Operator relay library
//!
//! Chat intake, notification delivery, service dispatch and container key provisioning.

pub mod app;
pub mod chat;
pub mod config;
pub mod diagnostic;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod logs;
pub mod notify;
pub mod provision;
pub mod server;
pub mod utils;
pub mod workers;
