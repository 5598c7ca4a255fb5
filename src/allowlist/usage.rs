//! Fire-and-forget usage log for domain-gated requests.

// crates.io
use tokio::task::JoinHandle;
// self
use crate::{
	_prelude::*,
	store::{StoreManager, USAGE_TABLE},
};

/// One entry of the `api-key-usage` list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
	/// Unix seconds at which the request arrived.
	#[serde(rename = "t")]
	pub at: i64,
	/// Request URL (scheme, host, and query) that carried the API key.
	#[serde(rename = "o", default, skip_serializing_if = "String::is_empty")]
	pub origin_url: String,
}

/// Pushes [`UsageRecord`]s onto the usage list from detached tasks.
///
/// Recording never blocks or fails the request: errors are logged at `debug` and dropped, and
/// records may land out of order.
#[derive(Clone, Debug)]
pub struct UsageRecorder {
	store: Arc<StoreManager>,
}
impl UsageRecorder {
	/// Creates a recorder writing through `store`.
	pub fn new(store: Arc<StoreManager>) -> Self {
		Self { store }
	}

	/// Spawns the push for a request seen at `request_url`.
	///
	/// The returned handle may be dropped; it exists so callers can await completion in tests.
	pub fn record(&self, request_url: &Url) -> JoinHandle<()> {
		let store = self.store.clone();
		let record = UsageRecord {
			at: OffsetDateTime::now_utc().unix_timestamp(),
			origin_url: usage_origin(request_url),
		};

		tokio::spawn(async move {
			let payload = match serde_json::to_string(&record) {
				Ok(payload) => payload,
				Err(e) => {
					tracing::debug!(error = %e, "Usage record could not be encoded.");

					return;
				},
			};

			if let Err(e) = store.list_push(USAGE_TABLE, payload).await {
				tracing::debug!(error = %e, "Usage record was dropped.");
			}
		})
	}
}

fn usage_origin(url: &Url) -> String {
	let mut origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());

	if let Some(port) = url.port() {
		origin.push_str(&format!(":{port}"));
	}
	if let Some(query) = url.query().filter(|query| !query.is_empty()) {
		origin.push('?');
		origin.push_str(query);
	}

	origin
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::{MemoryStore, RetryPolicy};

	#[test]
	fn usage_origin_keeps_host_port_and_query_only() {
		let url = Url::parse("https://broker.example.com:8443/init?src=widget#frag")
			.expect("Fixture URL should parse.");

		assert_eq!(usage_origin(&url), "https://broker.example.com:8443?src=widget");
	}

	#[tokio::test]
	async fn record_pushes_compact_json() {
		let memory = MemoryStore::default();
		let store = Arc::new(
			StoreManager::connect(Arc::new(memory.clone()), RetryPolicy::immediate(1))
				.await
				.expect("Memory store should connect."),
		);
		let url = Url::parse("https://broker.example.com/init").expect("Fixture URL should parse.");

		UsageRecorder::new(store).record(&url).await.expect("Usage task should not panic.");

		let entries = memory.list(USAGE_TABLE);

		assert_eq!(entries.len(), 1);

		let record: UsageRecord =
			serde_json::from_str(&entries[0]).expect("Stored usage record should parse.");

		assert_eq!(record.origin_url, "https://broker.example.com");
		assert!(record.at > 0);
	}
}
