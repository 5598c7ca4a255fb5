//! Upstream ride API contract and the payloads the broker forwards.
//!
//! The broker treats the ride API as a black box: [`RideApi`] is the seam, [`ReqwestRideApi`]
//! talks to a real deployment, and tests substitute scripted doubles.

pub mod client;

pub use client::{ReqwestRideApi, ReqwestRideApiFactory};

// self
use crate::{_prelude::*, auth::SessionToken};

/// Boxed future returned by [`RideApi`] calls.
pub type RideFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Trip parameters shared by price estimates and upfront fares.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
	/// Pickup latitude.
	pub start_latitude: f64,
	/// Pickup longitude.
	pub start_longitude: f64,
	/// Drop-off latitude.
	pub end_latitude: f64,
	/// Drop-off longitude.
	pub end_longitude: f64,
	/// Saved pickup place (`home`, `work`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start_place_id: Option<String>,
	/// Saved drop-off place (`home`, `work`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_place_id: Option<String>,
	/// Seats requested for shared products.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub seat_count: Option<u32>,
	/// Product to quote; set per lookup by the fare estimator.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_id: Option<String>,
}
impl EstimateRequest {
	/// Rejects coordinates outside the WGS 84 range.
	pub fn validate(&self) -> Result<()> {
		for (field, value, bound) in [
			("start_latitude", self.start_latitude, 90.),
			("end_latitude", self.end_latitude, 90.),
			("start_longitude", self.start_longitude, 180.),
			("end_longitude", self.end_longitude, 180.),
		] {
			if !value.is_finite() || value.abs() > bound {
				return Err(Error::validation(format!("{field} is out of range")));
			}
		}

		Ok(())
	}

	/// Same trip, quoted for `product_id`.
	pub fn for_product(&self, product_id: impl Into<String>) -> Self {
		Self { product_id: Some(product_id.into()), ..self.clone() }
	}
}

/// One product's price range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
	/// Product the estimate applies to.
	pub product_id: String,
	/// Human-readable product name.
	#[serde(default)]
	pub display_name: String,
	/// Formatted estimate (for example `$12-15`).
	#[serde(default)]
	pub estimate: String,
	/// ISO 4217 currency code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub currency_code: Option<String>,
	/// Lower bound.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub low_estimate: Option<f64>,
	/// Upper bound.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub high_estimate: Option<f64>,
	/// Surge multiplier in force.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub surge_multiplier: Option<f64>,
	/// Expected trip duration in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration: Option<u64>,
	/// Expected trip distance.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub distance: Option<f64>,
}

/// One page of price estimates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatePage {
	/// Estimates on this page.
	#[serde(rename = "prices", default)]
	pub estimates: Vec<PriceEstimate>,
	/// Cursor for the next page; absent on the last one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub next_page_token: Option<String>,
}

/// Fixed-price quote for one product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpfrontFare {
	/// Quoted fare.
	pub fare: Fare,
	/// Trip estimate attached to the quote.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub trip: Option<TripEstimate>,
	/// Minutes until pickup.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pickup_estimate: Option<u32>,
}

/// Fare component of an [`UpfrontFare`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fare {
	/// Identifier to confirm the quote when requesting the ride.
	#[serde(default)]
	pub fare_id: String,
	/// Total fare.
	#[serde(default)]
	pub value: f64,
	/// ISO 4217 currency code.
	#[serde(default)]
	pub currency_code: String,
	/// Formatted fare.
	#[serde(default)]
	pub display: String,
	/// Unix seconds after which the quote lapses.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<i64>,
}

/// Trip component of an [`UpfrontFare`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripEstimate {
	/// Unit of `distance_estimate`.
	#[serde(default)]
	pub distance_unit: String,
	/// Expected distance.
	#[serde(default)]
	pub distance_estimate: f64,
	/// Expected duration in seconds.
	#[serde(default)]
	pub duration_estimate: u64,
}

/// Rider profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
	/// Rider identifier.
	#[serde(default)]
	pub uuid: String,
	/// First name.
	#[serde(default)]
	pub first_name: String,
	/// Last name.
	#[serde(default)]
	pub last_name: String,
	/// Email address.
	#[serde(default)]
	pub email: String,
	/// Avatar URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub picture: Option<String>,
	/// Fields the broker does not interpret, forwarded as-is.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}

/// Ride request forwarded by the order endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
	/// Product to request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_id: Option<String>,
	/// Upfront fare being accepted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fare_id: Option<String>,
	/// Pickup latitude.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start_latitude: Option<f64>,
	/// Pickup longitude.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start_longitude: Option<f64>,
	/// Drop-off latitude.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_latitude: Option<f64>,
	/// Drop-off longitude.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_longitude: Option<f64>,
	/// Saved pickup place.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start_place_id: Option<String>,
	/// Saved drop-off place.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_place_id: Option<String>,
	/// Seats requested for shared products.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub seat_count: Option<u32>,
}

/// Ride created by the upstream API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ride {
	/// Upstream ride identifier.
	#[serde(default)]
	pub request_id: String,
	/// Lifecycle status (`processing`, `accepted`, ...).
	#[serde(default)]
	pub status: String,
	/// Minutes until pickup.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub eta: Option<u32>,
	/// Fields the broker does not interpret, forwarded as-is.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}

/// Operations the broker consumes from the ride API, bound to one rider's token.
pub trait RideApi
where
	Self: Send + Sync,
{
	/// Fetches the rider profile.
	fn profile(&self) -> RideFuture<'_, Profile>;

	/// Fetches one page of price estimates; `page_token` is `None` for the first page.
	fn price_estimate_page<'a>(
		&'a self,
		request: &'a EstimateRequest,
		page_token: Option<&'a str>,
	) -> RideFuture<'a, EstimatePage>;

	/// Quotes a fixed price for `request.product_id`.
	fn upfront_fare<'a>(&'a self, request: &'a EstimateRequest) -> RideFuture<'a, UpfrontFare>;

	/// Requests a ride.
	fn request_ride<'a>(&'a self, request: &'a RideRequest) -> RideFuture<'a, Ride>;
}

/// Builds [`RideApi`] clients for a session token.
pub trait RideApiFactory
where
	Self: Send + Sync,
{
	/// Returns a client acting on behalf of the token's owner.
	fn for_token(&self, token: &SessionToken) -> Arc<dyn RideApi>;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn estimate_request_rejects_out_of_range_coordinates() {
		let mut request = EstimateRequest {
			start_latitude: 37.77,
			start_longitude: -122.41,
			end_latitude: 37.79,
			end_longitude: -122.39,
			..Default::default()
		};

		request.validate().expect("San Francisco trip should validate.");

		request.end_longitude = 200.;

		let err = request.validate().expect_err("Longitude above 180 should fail.");

		assert!(err.to_string().contains("end_longitude"));

		request.end_longitude = f64::NAN;

		assert!(request.validate().is_err());
	}

	#[test]
	fn for_product_keeps_trip_parameters() {
		let request = EstimateRequest { seat_count: Some(2), ..Default::default() };
		let quoted = request.for_product("pool");

		assert_eq!(quoted.product_id.as_deref(), Some("pool"));
		assert_eq!(quoted.seat_count, Some(2));
	}

	#[test]
	fn profile_keeps_unknown_fields() {
		let profile: Profile = serde_json::from_str(
			r#"{"uuid":"r-1","first_name":"Ada","promo_code":"ADA42","mobile_verified":true}"#,
		)
		.expect("Profile fixture should parse.");

		assert_eq!(profile.first_name, "Ada");
		assert_eq!(profile.extra.get("promo_code"), Some(&serde_json::json!("ADA42")));

		let round = serde_json::to_value(&profile).expect("Profile should serialize.");

		assert_eq!(round["mobile_verified"], serde_json::json!(true));
	}
}
