//! Thread-safe in-memory [`KeyValueStore`] for local development and tests.

// std
use std::collections::{HashSet, VecDeque};
// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreConnector, StoreFuture, StoreHandle},
};

#[derive(Debug, Default)]
struct Tables {
	hashes: HashMap<String, HashMap<String, String>>,
	sets: HashMap<String, HashSet<String>>,
	lists: HashMap<String, VecDeque<String>>,
}

/// Storage backend that keeps every table in-process.
///
/// Clones share the same tables, so a `MemoryStore` also acts as its own [`StoreConnector`]:
/// reconnecting hands back another view of the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Tables>>);
impl MemoryStore {
	/// Returns a snapshot of list `table`, newest entry first.
	pub fn list(&self, table: &str) -> Vec<String> {
		self.0.read().lists.get(table).map(|list| list.iter().cloned().collect()).unwrap_or_default()
	}

	/// Returns the number of fields in hash `table`.
	pub fn hash_len(&self, table: &str) -> usize {
		self.0.read().hashes.get(table).map_or(0, HashMap::len)
	}
}
impl KeyValueStore for MemoryStore {
	fn hash_set<'a>(
		&'a self,
		table: &'a str,
		key: &'a str,
		value: String,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().hashes.entry(table.to_owned()).or_default().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn hash_get<'a>(&'a self, table: &'a str, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			Ok(self.0.read().hashes.get(table).and_then(|hash| hash.get(key)).cloned())
		})
	}

	fn hash_pop<'a>(&'a self, table: &'a str, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut guard = self.0.write();

			Ok(guard.hashes.get_mut(table).and_then(|hash| hash.remove(key)))
		})
	}

	fn set_add<'a>(&'a self, table: &'a str, members: &'a [String]) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().sets.entry(table.to_owned()).or_default().extend(members.iter().cloned());

			Ok(())
		})
	}

	fn set_is_member<'a>(&'a self, table: &'a str, member: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			Ok(self.0.read().sets.get(table).is_some_and(|set| set.contains(member)))
		})
	}

	fn list_push<'a>(&'a self, table: &'a str, value: String) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().lists.entry(table.to_owned()).or_default().push_front(value);

			Ok(())
		})
	}
}
impl StoreConnector for MemoryStore {
	fn connect(&self) -> StoreFuture<'_, StoreHandle> {
		let handle: StoreHandle = Arc::new(self.clone());

		Box::pin(async move { Ok(handle) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn pop_removes_exactly_once() {
		let store = MemoryStore::default();

		store.hash_set("t", "k", "v".into()).await.expect("Set should succeed.");

		assert_eq!(store.hash_get("t", "k").await.expect("Get should succeed."), Some("v".into()));
		assert_eq!(store.hash_pop("t", "k").await.expect("Pop should succeed."), Some("v".into()));
		assert_eq!(store.hash_pop("t", "k").await.expect("Pop should succeed."), None);
		assert_eq!(store.hash_len("t"), 0);
	}

	#[tokio::test]
	async fn sets_are_idempotent_and_lists_push_to_front() {
		let store = MemoryStore::default();
		let members = vec!["a.example".to_owned(), "a.example".to_owned()];

		store.set_add("key", &members).await.expect("Set add should succeed.");

		assert!(store.set_is_member("key", "a.example").await.expect("Member check should work."));
		assert!(!store.set_is_member("key", "b.example").await.expect("Member check should work."));
		assert!(!store.set_is_member("other", "a.example").await.expect("Member check should work."));

		store.list_push("log", "1".into()).await.expect("Push should succeed.");
		store.list_push("log", "2".into()).await.expect("Push should succeed.");

		assert_eq!(store.list("log"), vec!["2".to_owned(), "1".to_owned()]);
	}

	#[tokio::test]
	async fn connector_hands_out_shared_views() {
		let store = MemoryStore::default();
		let handle = store.connect().await.expect("Memory connector should never fail.");

		handle.hash_set("t", "k", "v".into()).await.expect("Set should succeed.");

		assert_eq!(store.hash_len("t"), 1);
	}
}
