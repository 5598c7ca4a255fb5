//! Auth-domain identifiers and session token models.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{secret::*, session::*};
