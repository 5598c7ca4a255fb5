//! Observability helpers shared by the broker flows, the store manager, and the fare pipeline.
//!
//! - Spans are named `ride_broker.flow` and carry the `flow` and `stage` fields.
//! - With the `metrics` feature, `ride_broker_flow_total` counts every attempt, success, and
//!   failure per flow, and `ride_broker_store_reconnect_total` counts store reconnects.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorize URL issuance and pending-state write.
	Grant,
	/// Callback handling: state consumption and code exchange.
	Callback,
	/// Session token lookup for an authenticated request.
	Session,
	/// Renewal of an expired session token.
	Refresh,
	/// Session revocation.
	Revoke,
	/// Fare estimation pipeline.
	Estimate,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Grant => "grant",
			FlowKind::Callback => "callback",
			FlowKind::Session => "session",
			FlowKind::Refresh => "refresh",
			FlowKind::Revoke => "revoke",
			FlowKind::Estimate => "estimate",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto [`FlowOutcome::Success`] or [`FlowOutcome::Failure`].
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure }
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
