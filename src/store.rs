//! Key-value store contracts, table names, and built-in backends.
//!
//! Every broker operation reaches the store through [`StoreManager`], which owns the single
//! shared handle and heals connection-level failures by reconnecting.

pub mod manager;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use manager::*;
pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use redis::{RedisConnector, RedisStore};

// self
use crate::_prelude::*;

/// Hash table mapping pending `state` values to their grant record.
pub const STATE_TABLE: &str = "state-table";
/// Hash table mapping session nonces to their stored token.
pub const OAUTH2_TABLE: &str = "oauth2-table";
/// List receiving one usage record per domain-gated request.
pub const USAGE_TABLE: &str = "api-key-usage";

/// Boxed future returned by store backends.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Shared handle to a live store backend.
pub type StoreHandle = Arc<dyn KeyValueStore>;

/// Capability contract over a remote, possibly-reconnecting key-value backend.
///
/// Tables are addressed by name. A table is either a hash (field → value), a set of members,
/// or a list; backends must not mix kinds under one name.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Inserts or replaces `key` in hash `table`.
	fn hash_set<'a>(&'a self, table: &'a str, key: &'a str, value: String)
	-> StoreFuture<'a, ()>;

	/// Reads `key` from hash `table` without removing it.
	fn hash_get<'a>(&'a self, table: &'a str, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Reads and deletes `key` from hash `table` as one atomic step.
	fn hash_pop<'a>(&'a self, table: &'a str, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Adds every member to set `table`; existing members are kept.
	fn set_add<'a>(&'a self, table: &'a str, members: &'a [String]) -> StoreFuture<'a, ()>;

	/// Tests whether `member` belongs to set `table`.
	fn set_is_member<'a>(&'a self, table: &'a str, member: &'a str) -> StoreFuture<'a, bool>;

	/// Pushes `value` onto the head of list `table`.
	fn list_push<'a>(&'a self, table: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Releases backend resources. Called best effort before a handle is replaced.
	fn close(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}

/// Factory that opens fresh backend handles for [`StoreManager`].
pub trait StoreConnector
where
	Self: Send + Sync,
{
	/// Opens a new connection to the backend.
	fn connect(&self) -> StoreFuture<'_, StoreHandle>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The connection to the backend is gone; the manager reconnects and retries.
	#[error("Store connection failed: {message}.")]
	Connection {
		/// Human-readable error payload.
		message: String,
	},
	/// A stored payload could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend rejected the command.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Returns `true` for connection-level failures that warrant a reconnect.
	pub fn is_connection(&self) -> bool {
		matches!(self, Self::Connection { .. })
	}

	/// Wraps a JSON failure for a stored payload.
	pub fn serialization(e: impl Display) -> Self {
		Self::Serialization { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "WRONGTYPE".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("WRONGTYPE"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn only_connection_errors_trigger_reconnects() {
		assert!(StoreError::Connection { message: "broken pipe".into() }.is_connection());
		assert!(!StoreError::serialization("eof").is_connection());
		assert!(!StoreError::Backend { message: "denied".into() }.is_connection());
	}
}
