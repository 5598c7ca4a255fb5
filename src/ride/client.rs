//! reqwest-backed [`RideApi`] speaking the provider's v1.2 REST endpoints.

// crates.io
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{SessionToken, TokenSecret},
	error::UpstreamError,
	http::ReqwestHttpClient,
	provider::ProviderDescriptor,
	ride::{
		EstimatePage, EstimateRequest, Profile, Ride, RideApi, RideApiFactory, RideFuture,
		RideRequest, UpfrontFare,
	},
};

const ERROR_BODY_PREVIEW: usize = 512;

/// Ride API client bound to one bearer token.
#[derive(Clone)]
pub struct ReqwestRideApi {
	http: ReqwestHttpClient,
	base: Url,
	access_token: TokenSecret,
}
impl ReqwestRideApi {
	/// Creates a client rooted at `base` (for example `https://api.uber.com/`).
	pub fn new(http: ReqwestHttpClient, base: Url, access_token: TokenSecret) -> Self {
		Self { http, base, access_token }
	}

	fn endpoint(&self, endpoint: &'static str, path: &str) -> Result<Url> {
		self.base.join(path).map_err(|e| {
			UpstreamError::Other { endpoint, message: format!("invalid URL: {e}") }.into()
		})
	}

	async fn send<T>(&self, endpoint: &'static str, request: RequestBuilder) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = request
			.bearer_auth(self.access_token.expose())
			.send()
			.await
			.map_err(|e| UpstreamError::network(endpoint, e))?;
		let status = response.status();
		let body = response.bytes().await.map_err(|e| UpstreamError::network(endpoint, e))?;

		if !status.is_success() {
			let preview = String::from_utf8_lossy(&body).chars().take(ERROR_BODY_PREVIEW).collect();

			tracing::warn!(endpoint, status = status.as_u16(), "Ride API rejected the request.");

			return Err(UpstreamError::Status { endpoint, status: status.as_u16(), body: preview }
				.into());
		}

		let de = &mut serde_json::Deserializer::from_slice(&body);

		serde_path_to_error::deserialize(de)
			.map_err(|source| UpstreamError::Decode { endpoint, source }.into())
	}
}
impl Debug for ReqwestRideApi {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestRideApi").field("base", &self.base.as_str()).finish()
	}
}
impl RideApi for ReqwestRideApi {
	fn profile(&self) -> RideFuture<'_, Profile> {
		Box::pin(async move {
			let url = self.endpoint("profile", "v1.2/me")?;

			self.send("profile", self.http.get(url)).await
		})
	}

	fn price_estimate_page<'a>(
		&'a self,
		request: &'a EstimateRequest,
		page_token: Option<&'a str>,
	) -> RideFuture<'a, EstimatePage> {
		Box::pin(async move {
			let mut url = self.endpoint("price_estimate", "v1.2/estimates/price")?;

			{
				let mut pairs = url.query_pairs_mut();

				pairs.append_pair("start_latitude", &request.start_latitude.to_string());
				pairs.append_pair("start_longitude", &request.start_longitude.to_string());
				pairs.append_pair("end_latitude", &request.end_latitude.to_string());
				pairs.append_pair("end_longitude", &request.end_longitude.to_string());

				if let Some(place) = &request.start_place_id {
					pairs.append_pair("start_place_id", place);
				}
				if let Some(place) = &request.end_place_id {
					pairs.append_pair("end_place_id", place);
				}
				if let Some(seats) = request.seat_count {
					pairs.append_pair("seat_count", &seats.to_string());
				}
				if let Some(token) = page_token {
					pairs.append_pair("page_token", token);
				}
			}

			self.send("price_estimate", self.http.get(url)).await
		})
	}

	fn upfront_fare<'a>(&'a self, request: &'a EstimateRequest) -> RideFuture<'a, UpfrontFare> {
		Box::pin(async move {
			let url = self.endpoint("upfront_fare", "v1.2/requests/estimate")?;

			self.send("upfront_fare", self.http.post(url).json(request)).await
		})
	}

	fn request_ride<'a>(&'a self, request: &'a RideRequest) -> RideFuture<'a, Ride> {
		Box::pin(async move {
			let url = self.endpoint("request_ride", "v1.2/requests")?;

			self.send("request_ride", self.http.post(url).json(request)).await
		})
	}
}

/// Mints a [`ReqwestRideApi`] per session, sharing one connection pool.
#[derive(Clone, Debug)]
pub struct ReqwestRideApiFactory {
	http: ReqwestHttpClient,
	base: Url,
}
impl ReqwestRideApiFactory {
	/// Creates a factory for the API rooted at `base`.
	pub fn new(http: ReqwestHttpClient, base: Url) -> Self {
		Self { http, base }
	}

	/// Creates a factory for the ride API declared by `descriptor`.
	pub fn from_descriptor(http: ReqwestHttpClient, descriptor: &ProviderDescriptor) -> Self {
		Self::new(http, descriptor.endpoints.ride_api.clone())
	}
}
impl RideApiFactory for ReqwestRideApiFactory {
	fn for_token(&self, token: &SessionToken) -> Arc<dyn RideApi> {
		Arc::new(ReqwestRideApi::new(
			self.http.clone(),
			self.base.clone(),
			token.access_token.clone(),
		))
	}
}
