//! Privileged external actions

pub mod command;
pub mod pct;
pub mod systemctl;
