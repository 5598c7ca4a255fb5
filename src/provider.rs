//! Ride provider metadata (descriptor) and token-error classification (strategy).
//!
//! `descriptor` holds the validated HTTPS endpoints the broker talks to: the OAuth authorize
//! and token endpoints plus the base URL of the ride API. `strategy` maps token endpoint
//! failures onto the broker error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
