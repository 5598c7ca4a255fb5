//! Session token payloads persisted by the broker.

pub mod secret;
pub mod session;
