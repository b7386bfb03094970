//! Container SSH key provisioning

pub mod dispatcher;
pub mod resolver;
pub mod selector;
