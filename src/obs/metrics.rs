// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{FlowKind, FlowOutcome};

/// In-process attempt/success/failure counters, independent of the metrics recorder.
#[derive(Debug, Default)]
pub struct OutcomeCounters {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl OutcomeCounters {
	/// Returns the number of recorded attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of recorded successes.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of recorded failures.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, outcome: FlowOutcome) {
		let counter = match outcome {
			FlowOutcome::Attempt => &self.attempts,
			FlowOutcome::Success => &self.success,
			FlowOutcome::Failure => &self.failure,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"ride_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records one store reconnect step (attempt, success, or failure).
pub fn record_store_reconnect(outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ride_broker_store_reconnect_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
