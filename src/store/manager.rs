//! Process-wide store handle with single-flight reconnects and bounded retries.
//!
//! [`StoreManager::run`] executes one logical store operation. Logical failures (bad payloads,
//! rejected commands) return immediately. Connection-level failures trigger a reconnect followed
//! by a retry of the same operation, bounded by [`RetryPolicy::max_attempts`] and
//! [`RetryPolicy::deadline`]. Concurrent callers that fail on the same stale handle share one
//! reconnect: the handle carries a generation number, and a caller whose generation is already
//! outdated simply picks up the fresh handle.

// std
use std::time::{Duration as StdDuration, Instant};
// self
use crate::{
	_prelude::*,
	obs::{self, FlowOutcome, OutcomeCounters},
	store::{StoreConnector, StoreError, StoreHandle},
};

/// Bounds applied to connection-level retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Reconnect-then-retry rounds performed after the first failure.
	pub max_attempts: usize,
	/// Wall-clock budget across all rounds of one operation.
	pub deadline: StdDuration,
	/// Pause before each reconnect.
	pub backoff: StdDuration,
}
impl RetryPolicy {
	/// Reconnect rounds allowed per operation.
	pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

	/// Policy without pauses, useful for tests against in-process doubles.
	pub fn immediate(max_attempts: usize) -> Self {
		Self { max_attempts, deadline: StdDuration::from_secs(10), backoff: StdDuration::ZERO }
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			deadline: StdDuration::from_secs(10),
			backoff: StdDuration::from_millis(50),
		}
	}
}

/// Counters for reconnects started, completed, and failed.
pub type ReconnectMetrics = OutcomeCounters;

struct CurrentHandle {
	generation: u64,
	handle: StoreHandle,
}

/// Owner of the shared store handle.
pub struct StoreManager {
	connector: Arc<dyn StoreConnector>,
	current: RwLock<CurrentHandle>,
	reconnect_lock: AsyncMutex<()>,
	policy: RetryPolicy,
	metrics: ReconnectMetrics,
}
impl StoreManager {
	/// Opens the initial handle through `connector`.
	pub async fn connect(
		connector: Arc<dyn StoreConnector>,
		policy: RetryPolicy,
	) -> Result<Self, StoreError> {
		let handle = connector.connect().await?;

		tracing::info!(max_attempts = policy.max_attempts, "Store connection established.");

		Ok(Self {
			connector,
			current: RwLock::new(CurrentHandle { generation: 0, handle }),
			reconnect_lock: AsyncMutex::new(()),
			policy,
			metrics: ReconnectMetrics::default(),
		})
	}

	/// Returns the live handle.
	pub fn current(&self) -> StoreHandle {
		self.current.read().handle.clone()
	}

	/// Returns how many times the handle has been replaced.
	pub fn generation(&self) -> u64 {
		self.current.read().generation
	}

	/// Returns the retry policy in force.
	pub fn policy(&self) -> RetryPolicy {
		self.policy
	}

	/// Exposes reconnect counters.
	pub fn metrics(&self) -> &ReconnectMetrics {
		&self.metrics
	}

	/// Replaces the current handle unconditionally.
	pub async fn reconnect(&self) -> Result<StoreHandle, StoreError> {
		let (_, handle) = self.reconnect_from(self.generation()).await?;

		Ok(handle)
	}

	/// Runs a store operation, reconnecting and retrying on connection-level failures.
	///
	/// `operation` labels logs and the [`Error::StoreUnavailable`] raised once the policy is
	/// exhausted. The closure receives the handle to use for each try.
	pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T>
	where
		F: FnMut(StoreHandle) -> Fut,
		Fut: Future<Output = Result<T, StoreError>>,
	{
		let started = Instant::now();
		let (mut generation, handle) = self.snapshot();
		let mut last = match op(handle).await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_connection() => e,
			Err(e) => return Err(e.into()),
		};

		for attempt in 1..=self.policy.max_attempts {
			if started.elapsed() >= self.policy.deadline {
				tracing::warn!(operation, attempt, "Store retry deadline reached.");

				return Err(Error::StoreUnavailable { operation, attempts: attempt - 1, source: last });
			}
			if !self.policy.backoff.is_zero() {
				tokio::time::sleep(self.policy.backoff).await;
			}

			tracing::debug!(operation, attempt, error = %last, "Retrying store operation.");

			let handle = match self.reconnect_from(generation).await {
				Ok((fresh_generation, handle)) => {
					generation = fresh_generation;

					handle
				},
				Err(e) => {
					last = e;

					continue;
				},
			};

			match op(handle).await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_connection() => last = e,
				Err(e) => return Err(e.into()),
			}
		}

		tracing::error!(
			operation,
			attempts = self.policy.max_attempts,
			error = %last,
			"Store stayed unavailable after all reconnect attempts."
		);

		Err(Error::StoreUnavailable { operation, attempts: self.policy.max_attempts, source: last })
	}

	/// Inserts or replaces `key` in hash `table`.
	pub async fn hash_set(&self, table: &str, key: &str, value: String) -> Result<()> {
		self.run("hash_set", |store| {
			let value = value.clone();

			async move { store.hash_set(table, key, value).await }
		})
		.await
	}

	/// Reads `key` from hash `table`.
	pub async fn hash_get(&self, table: &str, key: &str) -> Result<Option<String>> {
		self.run("hash_get", |store| async move { store.hash_get(table, key).await }).await
	}

	/// Atomically reads and deletes `key` from hash `table`.
	pub async fn hash_pop(&self, table: &str, key: &str) -> Result<Option<String>> {
		self.run("hash_pop", |store| async move { store.hash_pop(table, key).await }).await
	}

	/// Adds `members` to set `table`.
	pub async fn set_add(&self, table: &str, members: &[String]) -> Result<()> {
		self.run("set_add", |store| async move { store.set_add(table, members).await }).await
	}

	/// Tests membership of `member` in set `table`.
	pub async fn set_is_member(&self, table: &str, member: &str) -> Result<bool> {
		self.run("set_is_member", |store| async move { store.set_is_member(table, member).await })
			.await
	}

	/// Pushes `value` onto list `table`.
	pub async fn list_push(&self, table: &str, value: String) -> Result<()> {
		self.run("list_push", |store| {
			let value = value.clone();

			async move { store.list_push(table, value).await }
		})
		.await
	}

	fn record_reconnect(&self, outcome: FlowOutcome) {
		self.metrics.record(outcome);
		obs::record_store_reconnect(outcome);
	}

	fn snapshot(&self) -> (u64, StoreHandle) {
		let current = self.current.read();

		(current.generation, current.handle.clone())
	}

	async fn reconnect_from(&self, seen: u64) -> Result<(u64, StoreHandle), StoreError> {
		let _reconnect = self.reconnect_lock.lock().await;
		let (generation, stale) = self.snapshot();

		if generation != seen {
			// Another caller already replaced the handle this caller failed on.
			return Ok((generation, stale));
		}

		self.record_reconnect(FlowOutcome::Attempt);

		if let Err(e) = stale.close().await {
			tracing::debug!(error = %e, "Closing the stale store handle failed.");
		}

		match self.connector.connect().await {
			Ok(handle) => {
				let generation = {
					let mut current = self.current.write();

					current.generation += 1;
					current.handle = handle.clone();

					current.generation
				};

				self.record_reconnect(FlowOutcome::Success);
				tracing::info!(generation, "Store reconnected.");

				Ok((generation, handle))
			},
			Err(e) => {
				self.record_reconnect(FlowOutcome::Failure);
				tracing::warn!(error = %e, "Store reconnect failed.");

				Err(e)
			},
		}
	}
}
impl Debug for StoreManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StoreManager")
			.field("generation", &self.generation())
			.field("policy", &self.policy)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::store::{KeyValueStore, MemoryStore, StoreFuture};

	/// Connector whose first `broken` handles fail every call at the connection level.
	struct Flaky {
		inner: MemoryStore,
		broken: usize,
		connects: AtomicUsize,
	}
	impl StoreConnector for Flaky {
		fn connect(&self) -> StoreFuture<'_, StoreHandle> {
			let n = self.connects.fetch_add(1, Ordering::SeqCst);
			let handle: StoreHandle =
				if n < self.broken { Arc::new(Dead) } else { Arc::new(self.inner.clone()) };

			Box::pin(async move { Ok(handle) })
		}
	}

	struct Dead;
	impl Dead {
		fn fail<'a, T: 'a + Send>() -> StoreFuture<'a, T> {
			Box::pin(async { Err(StoreError::Connection { message: "connection reset".into() }) })
		}
	}
	impl KeyValueStore for Dead {
		fn hash_set<'a>(&'a self, _: &'a str, _: &'a str, _: String) -> StoreFuture<'a, ()> {
			Self::fail()
		}

		fn hash_get<'a>(&'a self, _: &'a str, _: &'a str) -> StoreFuture<'a, Option<String>> {
			Self::fail()
		}

		fn hash_pop<'a>(&'a self, _: &'a str, _: &'a str) -> StoreFuture<'a, Option<String>> {
			Self::fail()
		}

		fn set_add<'a>(&'a self, _: &'a str, _: &'a [String]) -> StoreFuture<'a, ()> {
			Self::fail()
		}

		fn set_is_member<'a>(&'a self, _: &'a str, _: &'a str) -> StoreFuture<'a, bool> {
			Self::fail()
		}

		fn list_push<'a>(&'a self, _: &'a str, _: String) -> StoreFuture<'a, ()> {
			Self::fail()
		}
	}

	async fn manager(broken: usize) -> StoreManager {
		let connector =
			Arc::new(Flaky { inner: MemoryStore::default(), broken, connects: AtomicUsize::new(0) });

		StoreManager::connect(connector, RetryPolicy::immediate(10))
			.await
			.expect("Initial connect should succeed.")
	}

	#[tokio::test]
	async fn heals_after_three_broken_handles() {
		// Initial handle plus two reconnects are dead; the third reconnect is healthy.
		let manager = manager(3).await;

		manager.hash_set("t", "k", "v".into()).await.expect("Operation should eventually succeed.");

		assert_eq!(manager.metrics().attempts(), 3);
		assert_eq!(manager.metrics().successes(), 3);
		assert_eq!(manager.generation(), 3);
		assert_eq!(
			manager.hash_get("t", "k").await.expect("Read should succeed."),
			Some("v".into())
		);
	}

	#[tokio::test]
	async fn surfaces_unavailable_after_exactly_ten_reconnects() {
		let manager = manager(usize::MAX).await;
		let err = manager.hash_get("t", "k").await.expect_err("Dead store should be unavailable.");

		assert!(matches!(err, Error::StoreUnavailable { attempts: 10, operation: "hash_get", .. }));
		assert_eq!(manager.metrics().attempts(), 10);
	}

	#[tokio::test]
	async fn logical_errors_are_not_retried() {
		let manager = manager(0).await;
		let err = manager
			.run("custom", |_| async {
				Err::<(), _>(StoreError::Backend { message: "WRONGTYPE".into() })
			})
			.await
			.expect_err("Logical error should surface.");

		assert!(matches!(err, Error::Storage(StoreError::Backend { .. })));
		assert_eq!(manager.metrics().attempts(), 0);
	}

	#[tokio::test]
	async fn stale_generation_skips_redundant_reconnect() {
		let manager = manager(0).await;
		let fresh = manager.reconnect().await.expect("Reconnect should succeed.");
		let (generation, handle) =
			manager.reconnect_from(0).await.expect("Outdated caller should reuse the fresh handle.");

		assert_eq!(generation, 1);
		assert!(Arc::ptr_eq(&fresh, &handle));
		assert_eq!(manager.metrics().attempts(), 1);
	}
}
