//! Operator notifications

pub mod gateway;
