//! Command dispatch core

pub mod dispatcher;
pub mod fsm;
pub mod intent;
pub mod single_flight;
