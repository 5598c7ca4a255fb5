//! Bounded worker pool delivering results in completion order.

// crates.io
use tokio::sync::{Semaphore, mpsc};
// self
use crate::_prelude::*;

/// Unit of work accepted by [`WorkerPool`].
pub trait Job
where
	Self: 'static + Send,
{
	/// Value produced on success.
	type Output: 'static + Send;

	/// Performs the work.
	fn run(self) -> impl Future<Output = Result<Self::Output>> + Send;
}

/// Completed job, tagged with its submission index.
#[derive(Debug)]
pub struct JobResult<T> {
	/// Position of the job in the submitted sequence.
	pub id: usize,
	/// Job outcome.
	pub result: Result<T>,
}

/// Runs jobs with a fixed ceiling on how many execute at once.
///
/// Jobs are not cancellable once started; each runs to completion or failure.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
	concurrency: usize,
}
impl WorkerPool {
	/// Creates a pool; a ceiling of zero is raised to one.
	pub fn new(concurrency: usize) -> Self {
		Self { concurrency: concurrency.max(1) }
	}

	/// Returns the in-flight ceiling.
	pub fn concurrency(&self) -> usize {
		self.concurrency
	}

	/// Submits `jobs` and returns a receiver yielding each result as it completes.
	///
	/// The receiver closes after the last result.
	pub fn run<J, I>(&self, jobs: I) -> mpsc::Receiver<JobResult<J::Output>>
	where
		J: Job,
		I: IntoIterator<Item = J>,
		I::IntoIter: 'static + Send,
	{
		let (tx, rx) = mpsc::channel(self.concurrency);
		let slots = Arc::new(Semaphore::new(self.concurrency));
		let jobs = jobs.into_iter();

		tokio::spawn(async move {
			for (id, job) in jobs.enumerate() {
				let Ok(slot) = slots.clone().acquire_owned().await else {
					break;
				};
				let tx = tx.clone();

				tokio::spawn(async move {
					let result = job.run().await;

					drop(slot);

					if tx.send(JobResult { id, result }).await.is_err() {
						tracing::debug!(job = id, "Pool result receiver dropped.");
					}
				});
			}
		});

		rx
	}
}
