//! Process configuration for the `ride-broker` binary.
//!
//! Every flag can also be supplied through a `RIDE_BROKER_*` environment variable.

// std
use std::{net::SocketAddr, time::Duration as StdDuration};
// crates.io
use clap::Parser;
use tracing_subscriber::EnvFilter;
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	fare::EstimatorConfig,
	flows::DEFAULT_SCOPES,
	provider::ProviderDescriptor,
	store::RetryPolicy,
};

/// Command-line and environment configuration.
#[derive(Clone, Debug, Parser)]
#[command(name = "ride-broker", version, about = "OAuth 2.0 session broker for ride-hailing front-ends.")]
pub struct BrokerConfig {
	/// Address the HTTP server listens on.
	#[arg(long, env = "RIDE_BROKER_BIND", default_value = "0.0.0.0:9899")]
	pub bind: SocketAddr,
	/// Redis connection URL.
	#[arg(long, env = "RIDE_BROKER_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
	pub redis_url: String,
	/// OAuth 2.0 client identifier.
	#[arg(long, env = "RIDE_BROKER_CLIENT_ID")]
	pub client_id: String,
	/// OAuth 2.0 client secret.
	#[arg(long, env = "RIDE_BROKER_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: String,
	/// Provider authorization endpoint.
	#[arg(
		long,
		env = "RIDE_BROKER_AUTHORIZE_URL",
		default_value = "https://login.uber.com/oauth/v2/authorize"
	)]
	pub authorize_url: Url,
	/// Provider token endpoint.
	#[arg(long, env = "RIDE_BROKER_TOKEN_URL", default_value = "https://login.uber.com/oauth/v2/token")]
	pub token_url: Url,
	/// Base URL of the ride API.
	#[arg(long, env = "RIDE_BROKER_RIDE_API_URL", default_value = "https://api.uber.com/")]
	pub ride_api_url: Url,
	/// Scopes requested on every grant (comma-separated).
	#[arg(long, env = "RIDE_BROKER_SCOPES", value_delimiter = ',', default_values_t = DEFAULT_SCOPES.map(String::from))]
	pub scopes: Vec<String>,
	/// Reconnect rounds per store operation.
	#[arg(long, env = "RIDE_BROKER_STORE_RETRY_ATTEMPTS", default_value_t = RetryPolicy::DEFAULT_MAX_ATTEMPTS)]
	pub store_retry_attempts: usize,
	/// Wall-clock budget per store operation, in milliseconds.
	#[arg(long, env = "RIDE_BROKER_STORE_RETRY_DEADLINE_MS", default_value_t = 10_000)]
	pub store_retry_deadline_ms: u64,
	/// Pause before each reconnect, in milliseconds.
	#[arg(long, env = "RIDE_BROKER_STORE_RETRY_BACKOFF_MS", default_value_t = 50)]
	pub store_retry_backoff_ms: u64,
	/// Price estimates collected before paging stops.
	#[arg(long, env = "RIDE_BROKER_FARE_QUOTA", default_value_t = EstimatorConfig::DEFAULT_QUOTA)]
	pub fare_quota: usize,
	/// Upfront-fare lookups allowed in flight.
	#[arg(long, env = "RIDE_BROKER_FARE_CONCURRENCY", default_value_t = EstimatorConfig::DEFAULT_CONCURRENCY)]
	pub fare_concurrency: usize,
	/// Log filter used when `RUST_LOG` is unset.
	#[arg(long, env = "RIDE_BROKER_LOG", default_value = "info")]
	pub log_filter: String,
}
impl BrokerConfig {
	/// Validates the provider endpoints into a descriptor.
	pub fn descriptor(&self) -> Result<ProviderDescriptor> {
		let id = ProviderId::new("uber").map_err(Error::validation)?;
		let descriptor = ProviderDescriptor::builder(id)
			.authorization_endpoint(self.authorize_url.clone())
			.token_endpoint(self.token_url.clone())
			.ride_api_base(self.ride_api_url.clone())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(descriptor)
	}

	/// Store retry policy assembled from the retry flags.
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			max_attempts: self.store_retry_attempts,
			deadline: StdDuration::from_millis(self.store_retry_deadline_ms),
			backoff: StdDuration::from_millis(self.store_retry_backoff_ms),
		}
	}

	/// Fare estimator limits.
	pub fn estimator_config(&self) -> EstimatorConfig {
		EstimatorConfig { quota: self.fare_quota, concurrency: self.fare_concurrency }
	}

	/// Installs the global `tracing` subscriber.
	///
	/// `RUST_LOG` takes precedence over [`BrokerConfig::log_filter`].
	pub fn install_subscriber(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
		let filter = match EnvFilter::try_from_default_env() {
			Ok(filter) => filter,
			Err(_) => EnvFilter::try_new(&self.log_filter)?,
		};

		tracing_subscriber::fmt().with_env_filter(filter).try_init()
	}
}
