//! Chat front end

pub mod models;
pub mod telegram;
pub mod transport;
