//! HTTP entry point: loads configuration, connects Redis, and serves the broker routes.

// std
use std::{process::ExitCode, sync::Arc};
// crates.io
use clap::Parser;
use ride_broker::{
	allowlist::DomainAllowlist,
	api::{self, AppState},
	config::BrokerConfig,
	fare::FareEstimator,
	flows::Broker,
	http::ReqwestHttpClient,
	ride::ReqwestRideApiFactory,
	store::{RedisConnector, StoreManager},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
	let config = BrokerConfig::parse();

	if let Err(e) = config.install_subscriber() {
		eprintln!("Failed to install the log subscriber: {e}");

		return ExitCode::FAILURE;
	}

	match run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "Broker stopped.");

			ExitCode::FAILURE
		},
	}
}

async fn run(config: BrokerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let descriptor = config.descriptor()?;
	let connector = Arc::new(RedisConnector::open(&config.redis_url)?);
	let store = Arc::new(StoreManager::connect(connector, config.retry_policy()).await?);
	let http = ReqwestHttpClient::new()?;
	let broker = Broker::with_http_client(
		store.clone(),
		descriptor.clone(),
		config.client_id.clone(),
		&config.client_secret,
		http.clone(),
	)?
	.with_scopes(config.scopes.clone());
	let state = AppState {
		broker,
		allowlist: DomainAllowlist::new(store),
		rides: Arc::new(ReqwestRideApiFactory::from_descriptor(http, &descriptor)),
		estimator: FareEstimator::new(config.estimator_config()),
	};
	let listener = TcpListener::bind(config.bind).await?;

	tracing::info!(bind = %config.bind, "Serving ride broker.");

	axum::serve(listener, api::router(state)).await?;

	Ok(())
}
