//! Fare estimation: paged price estimates with early cancellation, then bounded fan-out
//! upfront-fare lookups collected in completion order.

pub mod paging;
pub mod pool;

pub use paging::*;
pub use pool::*;

// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowSpan},
	ride::{EstimateRequest, PriceEstimate, RideApi, UpfrontFare},
};

/// Tuning knobs for [`FareEstimator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EstimatorConfig {
	/// Estimates to collect before paging is cancelled.
	pub quota: usize,
	/// Upfront-fare lookups allowed in flight at once.
	pub concurrency: usize,
}
impl EstimatorConfig {
	/// Estimates collected by default.
	pub const DEFAULT_QUOTA: usize = 4;
	/// Concurrent lookups allowed by default.
	pub const DEFAULT_CONCURRENCY: usize = 5;
}
impl Default for EstimatorConfig {
	fn default() -> Self {
		Self { quota: Self::DEFAULT_QUOTA, concurrency: Self::DEFAULT_CONCURRENCY }
	}
}

/// A price estimate paired with the upfront fare quoted for its product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FarePair {
	/// Estimate returned by the paging stage.
	pub estimate: PriceEstimate,
	/// Fixed-price quote for the estimate's product.
	pub upfront_fare: UpfrontFare,
}

/// Runs the estimate pipeline against a rider's [`RideApi`].
#[derive(Clone, Debug, Default)]
pub struct FareEstimator {
	config: EstimatorConfig,
}
impl FareEstimator {
	/// Creates an estimator with explicit limits.
	pub fn new(config: EstimatorConfig) -> Self {
		Self { config }
	}

	/// Returns the limits in force.
	pub fn config(&self) -> EstimatorConfig {
		self.config
	}

	/// Collects estimates up to the quota, then quotes each one.
	///
	/// Lookups that fail are logged and left out, so the result may hold fewer pairs than
	/// estimates and arrives in no particular order.
	pub async fn estimate(
		&self,
		api: Arc<dyn RideApi>,
		request: EstimateRequest,
	) -> Result<Vec<FarePair>> {
		FlowSpan::new(FlowKind::Estimate, "estimate")
			.observe(async move {
				request.validate()?;

				let estimates =
					collect_estimates(api.clone(), request.clone(), self.config.quota).await?;

				tracing::debug!(estimates = estimates.len(), "Collected price estimates.");

				Ok(lookup_fares(api, &request, estimates, self.config.concurrency).await)
			})
			.await
	}
}

/// Quotes every estimate on a [`WorkerPool`] and keeps the successful pairs.
pub async fn lookup_fares(
	api: Arc<dyn RideApi>,
	request: &EstimateRequest,
	estimates: Vec<PriceEstimate>,
	concurrency: usize,
) -> Vec<FarePair> {
	let jobs: Vec<_> = estimates
		.into_iter()
		.map(|estimate| FareLookup::new(api.clone(), request, estimate))
		.collect();
	let total = jobs.len();
	let mut results = WorkerPool::new(concurrency).run(jobs);
	let mut pairs = Vec::with_capacity(total);

	while let Some(JobResult { id, result }) = results.recv().await {
		match result {
			Ok(pair) => pairs.push(pair),
			Err(e) => {
				tracing::warn!(job = id, error = %e, "Upfront fare lookup failed; dropping it.")
			},
		}
	}

	pairs
}

/// Job quoting the upfront fare for one estimate's product.
pub struct FareLookup {
	api: Arc<dyn RideApi>,
	request: EstimateRequest,
	estimate: PriceEstimate,
}
impl FareLookup {
	/// Binds `estimate` to the trip in `request`.
	pub fn new(api: Arc<dyn RideApi>, request: &EstimateRequest, estimate: PriceEstimate) -> Self {
		Self { request: request.for_product(estimate.product_id.clone()), api, estimate }
	}
}
impl Job for FareLookup {
	type Output = FarePair;

	async fn run(self) -> Result<Self::Output> {
		let upfront_fare = self.api.upfront_fare(&self.request).await?;

		Ok(FarePair { estimate: self.estimate, upfront_fare })
	}
}
