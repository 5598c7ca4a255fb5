// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
};

/// Span wrapper used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	span: Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let span = tracing::info_span!("ride_broker.flow", flow = kind.as_str(), stage);

		Self { kind, span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}

	/// Runs `fut` inside the span and records attempt plus outcome counters around it.
	pub async fn observe<T, Fut>(self, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		obs::record_flow_outcome(self.kind, FlowOutcome::Attempt);

		let result = FlowSpan::instrument(&self, fut).await;

		if let Err(e) = &result {
			self.span.in_scope(|| tracing::debug!(error = %e, "Flow failed."));
		}

		obs::record_flow_outcome(self.kind, FlowOutcome::of(&result));

		result
	}
}
