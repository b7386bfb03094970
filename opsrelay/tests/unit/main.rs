//! Integration tests for the operator relay

mod fakes;
mod test_provision;
mod test_server;
