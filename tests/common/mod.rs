#![allow(dead_code)]

// std
use std::{
	collections::HashSet,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use httpmock::MockServer;
use ride_broker::{
	auth::{ProviderId, SessionToken},
	error::Error,
	flows::Broker,
	http::ReqwestHttpClient,
	provider::ProviderDescriptor,
	reqwest::Client,
	ride::{
		EstimatePage, EstimateRequest, Fare, PriceEstimate, Profile, Ride, RideApi, RideApiFactory,
		RideFuture, RideRequest, UpfrontFare,
	},
	store::{
		KeyValueStore, MemoryStore, RetryPolicy, StoreConnector, StoreError, StoreFuture,
		StoreHandle, StoreManager,
	},
	url::Url,
};

pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";

/// Reqwest client that accepts the self-signed certificates `httpmock` serves.
pub fn test_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn build_descriptor(server: &MockServer) -> ProviderDescriptor {
	let provider_id = ProviderId::new("uber").expect("Provider identifier should be valid.");

	ProviderDescriptor::builder(provider_id)
		.authorization_endpoint(
			Url::parse(&server.url("/oauth/v2/authorize"))
				.expect("Mock authorization endpoint should parse successfully."),
		)
		.token_endpoint(
			Url::parse(&server.url("/oauth/v2/token"))
				.expect("Mock token endpoint should parse successfully."),
		)
		.ride_api_base(Url::parse(&server.url("/")).expect("Mock ride API base should parse."))
		.build()
		.expect("Provider descriptor should build successfully.")
}

pub async fn memory_manager() -> (Arc<StoreManager>, MemoryStore) {
	let backend = MemoryStore::default();
	let manager = StoreManager::connect(Arc::new(backend.clone()), RetryPolicy::immediate(10))
		.await
		.expect("Memory store should connect.");

	(Arc::new(manager), backend)
}

pub async fn build_test_broker(server: &MockServer) -> (Broker, MemoryStore) {
	let (store, backend) = memory_manager().await;
	let broker = Broker::with_http_client(
		store,
		build_descriptor(server),
		CLIENT_ID,
		CLIENT_SECRET,
		test_http_client(),
	)
	.expect("Broker should build against the mock provider.");

	(broker, backend)
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"token_type": "bearer",
		"expires_in": expires_in,
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = serde_json::json!(refresh);
	}

	body.to_string()
}

pub fn sf_trip() -> EstimateRequest {
	EstimateRequest {
		start_latitude: 37.7752,
		start_longitude: -122.4185,
		end_latitude: 37.7899,
		end_longitude: -122.4026,
		..Default::default()
	}
}

/// Ride API double serving `pages` pages of `per_page` estimates each.
///
/// Counts page requests, tracks how many upfront-fare lookups overlap, and fails lookups for
/// the products listed in `failing_products`.
pub struct ScriptedRideApi {
	pub pages: usize,
	pub per_page: usize,
	pub fare_delay: StdDuration,
	pub failing_products: HashSet<String>,
	pub page_calls: AtomicUsize,
	pub fare_calls: AtomicUsize,
	pub fares_in_flight: AtomicUsize,
	pub max_fares_in_flight: AtomicUsize,
	pub profile: Profile,
}
impl ScriptedRideApi {
	pub fn new(pages: usize, per_page: usize) -> Self {
		Self {
			pages,
			per_page,
			fare_delay: StdDuration::from_millis(10),
			failing_products: HashSet::new(),
			page_calls: AtomicUsize::new(0),
			fare_calls: AtomicUsize::new(0),
			fares_in_flight: AtomicUsize::new(0),
			max_fares_in_flight: AtomicUsize::new(0),
			profile: Profile {
				uuid: "rider-1".into(),
				first_name: "Ada".into(),
				last_name: "Lovelace".into(),
				email: "ada@example.com".into(),
				..Default::default()
			},
		}
	}

	pub fn failing(mut self, product_id: &str) -> Self {
		self.failing_products.insert(product_id.to_owned());

		self
	}

	pub fn page_calls(&self) -> usize {
		self.page_calls.load(Ordering::SeqCst)
	}

	pub fn max_fares_in_flight(&self) -> usize {
		self.max_fares_in_flight.load(Ordering::SeqCst)
	}
}
impl RideApi for ScriptedRideApi {
	fn profile(&self) -> RideFuture<'_, Profile> {
		Box::pin(async move { Ok(self.profile.clone()) })
	}

	fn price_estimate_page<'a>(
		&'a self,
		_: &'a EstimateRequest,
		page_token: Option<&'a str>,
	) -> RideFuture<'a, EstimatePage> {
		Box::pin(async move {
			self.page_calls.fetch_add(1, Ordering::SeqCst);

			let index: usize = page_token.map_or(0, |token| token.parse().unwrap_or(0));
			let estimates = (0..self.per_page)
				.map(|slot| PriceEstimate {
					product_id: format!("product-{index}-{slot}"),
					display_name: format!("Product {index}.{slot}"),
					estimate: "$10-12".into(),
					..Default::default()
				})
				.collect();
			let next_page_token = (index + 1 < self.pages).then(|| (index + 1).to_string());

			Ok(EstimatePage { estimates, next_page_token })
		})
	}

	fn upfront_fare<'a>(&'a self, request: &'a EstimateRequest) -> RideFuture<'a, UpfrontFare> {
		Box::pin(async move {
			self.fare_calls.fetch_add(1, Ordering::SeqCst);

			let now = self.fares_in_flight.fetch_add(1, Ordering::SeqCst) + 1;

			self.max_fares_in_flight.fetch_max(now, Ordering::SeqCst);
			tokio::time::sleep(self.fare_delay).await;
			self.fares_in_flight.fetch_sub(1, Ordering::SeqCst);

			let product_id = request.product_id.clone().unwrap_or_default();

			if self.failing_products.contains(&product_id) {
				return Err(Error::validation(format!(
					"{product_id} is unavailable"
				)));
			}

			Ok(UpfrontFare {
				fare: Fare {
					fare_id: format!("fare-{product_id}"),
					value: 11.5,
					currency_code: "USD".into(),
					display: "$11.50".into(),
					expires_at: None,
				},
				..Default::default()
			})
		})
	}

	fn request_ride<'a>(&'a self, request: &'a RideRequest) -> RideFuture<'a, Ride> {
		Box::pin(async move {
			Ok(Ride {
				request_id: format!("ride-{}", request.product_id.as_deref().unwrap_or("any")),
				status: "processing".into(),
				..Default::default()
			})
		})
	}
}

/// Hands out the same [`ScriptedRideApi`] for every session.
pub struct ScriptedFactory(pub Arc<ScriptedRideApi>);
impl RideApiFactory for ScriptedFactory {
	fn for_token(&self, _: &SessionToken) -> Arc<dyn RideApi> {
		self.0.clone()
	}
}

/// Handle whose every call fails as if the socket had been reset.
pub struct Severed;
impl Severed {
	fn fail<'a, T: 'a + Send>() -> StoreFuture<'a, T> {
		Box::pin(async { Err(StoreError::Connection { message: "connection reset by peer".into() }) })
	}
}
impl KeyValueStore for Severed {
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

/// Hands out a severed handle first, then refuses `refusals` connects, then serves `healthy`.
pub struct Outage {
	healthy: MemoryStore,
	refusals: usize,
	connects: AtomicUsize,
}
impl Outage {
	pub fn new(refusals: usize) -> Self {
		Self { healthy: MemoryStore::default(), refusals, connects: AtomicUsize::new(0) }
	}

	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}
impl StoreConnector for Outage {
	fn connect(&self) -> StoreFuture<'_, StoreHandle> {
		let n = self.connects.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			match n {
				0 => Ok(Arc::new(Severed) as StoreHandle),
				n if n <= self.refusals =>
					Err(StoreError::Connection { message: "connection refused".into() }),
				_ => Ok(Arc::new(self.healthy.clone()) as StoreHandle),
			}
		})
	}
}

pub async fn manager_over(outage: &Arc<Outage>) -> Arc<StoreManager> {
	let connector: Arc<dyn StoreConnector> = outage.clone();

	Arc::new(
		StoreManager::connect(connector, RetryPolicy::immediate(10))
			.await
			.expect("Initial connect should hand out a handle."),
	)
}
