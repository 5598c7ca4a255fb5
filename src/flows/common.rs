//! Shared helpers for flow implementations (scope formatting, per-nonce guards, payload codecs).

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::Nonce, flows::Broker, store::StoreError};

/// Joins scopes with the provider's delimiter; `None` when no scope is requested.
pub(crate) fn format_scope(scopes: &[String], delimiter: char) -> Option<String> {
	if scopes.is_empty() {
		return None;
	}

	let mut buf = [0; 4];
	let separator: &str = delimiter.encode_utf8(&mut buf);

	Some(scopes.join(separator))
}

/// Per-nonce single-flight guard.
///
/// Dropping the guard removes its map entry once no other caller references it, including
/// when the owning future is cancelled mid-flight.
pub(crate) struct FlowGuard<'a> {
	broker: &'a Broker,
	nonce: &'a Nonce,
	lock: Arc<AsyncMutex<()>>,
}
impl FlowGuard<'_> {
	/// Waits until no other flow holds this nonce.
	pub(crate) async fn lock(&self) -> async_lock::MutexGuard<'_, ()> {
		self.lock.lock().await
	}
}
impl Drop for FlowGuard<'_> {
	fn drop(&mut self) {
		let mut guards = self.broker.flow_guards.lock();

		// One reference lives in the map, the other is ours.
		if guards.get(self.nonce).is_some_and(|entry| Arc::ptr_eq(entry, &self.lock))
			&& Arc::strong_count(&self.lock) <= 2
		{
			guards.remove(self.nonce);
		}
	}
}

/// Returns (and creates on demand) the single-flight guard for a nonce.
pub(crate) fn flow_guard<'a>(broker: &'a Broker, nonce: &'a Nonce) -> FlowGuard<'a> {
	let lock = broker
		.flow_guards
		.lock()
		.entry(nonce.clone())
		.or_insert_with(|| Arc::new(AsyncMutex::new(())))
		.clone();

	FlowGuard { broker, nonce, lock }
}

/// Encodes a stored payload.
pub(crate) fn encode<T>(value: &T) -> Result<String>
where
	T: Serialize,
{
	serde_json::to_string(value).map_err(|e| StoreError::serialization(e).into())
}

/// Decodes a stored payload, reporting the failing field path.
pub(crate) fn decode<T>(raw: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	let de = &mut serde_json::Deserializer::from_str(raw);

	serde_path_to_error::deserialize(de).map_err(|e| StoreError::serialization(e).into())
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;
	use crate::{
		auth::ProviderId,
		provider::ProviderDescriptor,
		store::{MemoryStore, RetryPolicy, StoreManager},
	};

	async fn broker() -> Broker {
		let store = StoreManager::connect(Arc::new(MemoryStore::default()), RetryPolicy::immediate(1))
			.await
			.expect("Memory store should connect.");
		let descriptor =
			ProviderDescriptor::builder(ProviderId::new("uber").expect("Provider id should be valid."))
				.authorization_endpoint(
					Url::parse("https://login.example.com/authorize").expect("URL should parse."),
				)
				.token_endpoint(Url::parse("https://login.example.com/token").expect("URL should parse."))
				.ride_api_base(Url::parse("https://api.example.com/").expect("URL should parse."))
				.build()
				.expect("Descriptor should build.");

		Broker::new(Arc::new(store), descriptor, "client", "secret").expect("Broker should build.")
	}

	#[tokio::test]
	async fn guard_entries_are_released_when_flows_are_dropped() {
		let broker = broker().await;
		let nonce = Nonce::generate();
		let held = flow_guard(&broker, &nonce);
		let lock = held.lock().await;

		{
			let waiter = flow_guard(&broker, &nonce);
			let queued = tokio::time::timeout(StdDuration::from_millis(10), waiter.lock()).await;

			assert!(queued.is_err(), "Second flow should wait behind the first.");
		}

		assert_eq!(broker.flow_guards.lock().len(), 1);

		drop(lock);
		drop(held);

		assert!(broker.flow_guards.lock().is_empty());
	}

	#[tokio::test]
	async fn released_guards_leave_newer_entries_alone() {
		let broker = broker().await;
		let nonce = Nonce::generate();
		let stale = flow_guard(&broker, &nonce);

		broker.flow_guards.lock().remove(&nonce);

		let fresh = flow_guard(&broker, &nonce);

		drop(stale);

		assert_eq!(broker.flow_guards.lock().len(), 1);

		drop(fresh);

		assert!(broker.flow_guards.lock().is_empty());
	}

	#[test]
	fn scope_formatting_handles_custom_delimiters() {
		let scopes = vec!["profile".to_owned(), "history".to_owned()];

		assert_eq!(format_scope(&scopes, ' '), Some("profile history".into()));
		assert_eq!(format_scope(&scopes, ','), Some("profile,history".into()));
		assert_eq!(format_scope(&[], ' '), None);
	}

	#[test]
	fn decode_reports_field_paths() {
		#[derive(Debug, Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			nonce: String,
		}

		let err = decode::<Payload>(r#"{"nonce":7}"#).expect_err("Wrong type should fail.");

		assert!(err.to_string().contains("nonce"));
	}
}
