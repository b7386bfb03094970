//! Relay configuration

pub mod settings;
