//! Redis-backed [`KeyValueStore`] over a multiplexed async connection.

// crates.io
use redis::{AsyncCommands, Client, RedisError, Script, aio::MultiplexedConnection};
// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreConnector, StoreError, StoreFuture, StoreHandle},
};

// HGET + HDEL in one server-side step so concurrent pops cannot both observe the field.
const HASH_POP_SCRIPT: &str = r"
local value = redis.call('HGET', KEYS[1], ARGV[1])
if value then
	redis.call('HDEL', KEYS[1], ARGV[1])
end
return value
";

/// Store handle wrapping one multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisStore {
	conn: MultiplexedConnection,
	pop: Arc<Script>,
}
impl RedisStore {
	/// Wraps an established connection.
	pub fn new(conn: MultiplexedConnection) -> Self {
		Self { conn, pop: Arc::new(Script::new(HASH_POP_SCRIPT)) }
	}
}
impl KeyValueStore for RedisStore {
	fn hash_set<'a>(
		&'a self,
		table: &'a str,
		key: &'a str,
		value: String,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let _: () = conn.hset(table, key, value).await.map_err(map_redis_error)?;

			Ok(())
		})
	}

	fn hash_get<'a>(&'a self, table: &'a str, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut conn = self.conn.clone();

			conn.hget(table, key).await.map_err(map_redis_error)
		})
	}

	fn hash_pop<'a>(&'a self, table: &'a str, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut conn = self.conn.clone();

			self.pop.key(table).arg(key).invoke_async(&mut conn).await.map_err(map_redis_error)
		})
	}

	fn set_add<'a>(&'a self, table: &'a str, members: &'a [String]) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			if members.is_empty() {
				return Ok(());
			}

			let mut conn = self.conn.clone();
			let _: () = conn.sadd(table, members).await.map_err(map_redis_error)?;

			Ok(())
		})
	}

	fn set_is_member<'a>(&'a self, table: &'a str, member: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut conn = self.conn.clone();

			conn.sismember(table, member).await.map_err(map_redis_error)
		})
	}

	fn list_push<'a>(&'a self, table: &'a str, value: String) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let _: () = conn.lpush(table, value).await.map_err(map_redis_error)?;

			Ok(())
		})
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RedisStore(..)")
	}
}

/// Opens multiplexed connections for [`crate::store::StoreManager`].
#[derive(Clone, Debug)]
pub struct RedisConnector {
	client: Client,
}
impl RedisConnector {
	/// Validates `url` (e.g. `redis://127.0.0.1:6379/0`) without connecting.
	pub fn open(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url)
			.map_err(|e| StoreError::Backend { message: format!("invalid Redis URL: {e}") })?;

		Ok(Self { client })
	}
}
impl StoreConnector for RedisConnector {
	fn connect(&self) -> StoreFuture<'_, StoreHandle> {
		Box::pin(async move {
			let conn = self.client.get_multiplexed_async_connection().await.map_err(|e| {
				tracing::error!(error = %e, "Redis connect failed.");

				StoreError::Connection { message: e.to_string() }
			})?;
			let handle: StoreHandle = Arc::new(RedisStore::new(conn));

			Ok(handle)
		})
	}
}

fn map_redis_error(e: RedisError) -> StoreError {
	if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
	{
		StoreError::Connection { message: e.to_string() }
	} else {
		tracing::error!(error = %e, "Redis command failed.");

		StoreError::Backend { message: e.to_string() }
	}
}
