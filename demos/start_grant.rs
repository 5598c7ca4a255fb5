//! Walks through registering a front-end, gating its origin, and starting a login.
//!
//! The callback half needs a live provider; the output shows what the redirect handler will
//! receive and where the token ends up.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use url::Url;
// self
use ride_broker::{
	allowlist::{DomainAllowlist, LoginData},
	auth::ProviderId,
	flows::{Broker, COOKIE_NAME},
	provider::ProviderDescriptor,
	store::{MemoryStore, RetryPolicy, STATE_TABLE, StoreManager},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let backend = MemoryStore::default();
	let store =
		Arc::new(StoreManager::connect(Arc::new(backend.clone()), RetryPolicy::default()).await?);
	let descriptor = ProviderDescriptor::builder(ProviderId::new("uber")?)
		.authorization_endpoint(Url::parse("https://login.uber.com/oauth/v2/authorize")?)
		.token_endpoint(Url::parse("https://login.uber.com/oauth/v2/token")?)
		.ride_api_base(Url::parse("https://sandbox-api.uber.com/")?)
		.build()?;
	let broker = Broker::new(store.clone(), descriptor, "demo-client", "demo-secret")?
		.with_scopes(["profile", "request"]);
	let allowlist = DomainAllowlist::new(store);
	let registration = allowlist.register_new_key(&["shop.example.com".to_owned()]).await?;

	println!("Issued API key {} for {:?}.", registration.api_key, registration.domains);

	let login = LoginData {
		api_key: registration.api_key.to_string(),
		origin: "https://shop.example.com/checkout".into(),
	};

	allowlist.authorize_origin(&login, &Url::parse("https://broker.example.com/init")?).await?;
	println!("Origin {} passed the allow-list.", login.origin);

	let session = broker.start_grant(Url::parse("https://broker.example.com/receive-oauth2")?).await?;

	println!("Send the rider to {}.", session.url);
	println!("Pending grants parked: {}.", backend.hash_len(STATE_TABLE));
	println!(
		"After the provider redirects back with state `{}`, the `{COOKIE_NAME}` cookie carries the session.",
		session.state
	);

	Ok(())
}
