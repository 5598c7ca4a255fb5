//! Price-estimate paging with cooperative cancellation.
//!
//! A producer task fetches pages into a channel of capacity one. It reserves channel capacity
//! before each fetch, so at most one page request runs ahead of what the consumer has taken.
//! Cancelling stops future fetches; pages already sent stay readable until the channel closes.

// crates.io
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	ride::{EstimatePage, EstimateRequest, PriceEstimate, RideApi},
};

/// Consumer side of a running page producer.
#[derive(Debug)]
pub struct EstimatePager {
	pages: mpsc::Receiver<Result<EstimatePage>>,
	cancel: CancellationToken,
	producer: JoinHandle<()>,
}
impl EstimatePager {
	/// Starts fetching pages for `request` in the background.
	pub fn spawn(api: Arc<dyn RideApi>, request: EstimateRequest) -> Self {
		let (tx, pages) = mpsc::channel(1);
		let cancel = CancellationToken::new();
		let producer = tokio::spawn(produce(api, request, tx, cancel.clone()));

		Self { pages, cancel, producer }
	}

	/// Receives the next page; `None` once the producer has stopped and the channel is empty.
	pub async fn next_page(&mut self) -> Option<Result<EstimatePage>> {
		self.pages.recv().await
	}

	/// Asks the producer to stop issuing page requests.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once [`EstimatePager::cancel`] has been called.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Returns `true` once the producer task has exited.
	pub fn is_finished(&self) -> bool {
		self.producer.is_finished()
	}
}
impl Drop for EstimatePager {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

/// Reads pages until `quota` estimates are held, then cancels and drains what was buffered.
///
/// Failed pages are logged and skipped. The first failure is returned only when no estimate was
/// collected at all.
pub async fn collect_estimates(
	api: Arc<dyn RideApi>,
	request: EstimateRequest,
	quota: usize,
) -> Result<Vec<PriceEstimate>> {
	let mut pager = EstimatePager::spawn(api, request);
	let mut estimates = Vec::new();
	let mut first_error = None;

	while let Some(page) = pager.next_page().await {
		match page {
			Ok(page) => estimates.extend(page.estimates),
			Err(e) => {
				tracing::warn!(error = %e, "Price estimate page failed.");

				first_error.get_or_insert(e);
			},
		}

		if estimates.len() >= quota && !pager.is_cancelled() {
			tracing::debug!(
				collected = estimates.len(),
				quota,
				"Estimate quota reached; cancelling paging."
			);

			pager.cancel();
		}
	}

	match first_error {
		Some(e) if estimates.is_empty() => Err(e),
		_ => Ok(estimates),
	}
}

async fn produce(
	api: Arc<dyn RideApi>,
	request: EstimateRequest,
	tx: mpsc::Sender<Result<EstimatePage>>,
	cancel: CancellationToken,
) {
	let mut page_token = None::<String>;

	loop {
		let permit = tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			permit = tx.reserve() => match permit {
				Ok(permit) => permit,
				Err(_) => return,
			},
		};
		let page = tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			page = api.price_estimate_page(&request, page_token.as_deref()) => page,
		};
		let next = page.as_ref().ok().and_then(|page| page.next_page_token.clone());

		permit.send(page);

		match next {
			Some(token) => page_token = Some(token),
			None => return,
		}
	}
}
