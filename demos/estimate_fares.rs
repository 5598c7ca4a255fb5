//! Runs the fare pipeline against an in-process ride API that serves canned pages.
//!
//! Paging stops once the quota is met; each collected estimate is then quoted on the worker
//! pool and printed in completion order.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use color_eyre::Result;
// self
use ride_broker::{
	error::Error,
	fare::{EstimatorConfig, FareEstimator},
	ride::{
		EstimatePage, EstimateRequest, Fare, PriceEstimate, Profile, Ride, RideApi, RideFuture,
		RideRequest, UpfrontFare,
	},
};

const PRODUCTS: [(&str, f64); 6] = [
	("uberx", 14.2),
	("comfort", 18.9),
	("uberxl", 22.4),
	("black", 37.0),
	("green", 15.1),
	("pet", 19.6),
];

#[derive(Default)]
struct CannedRideApi {
	page_calls: AtomicUsize,
}
impl RideApi for CannedRideApi {
	fn profile(&self) -> RideFuture<'_, Profile> {
		Box::pin(async { Ok(Profile { first_name: "Demo".into(), ..Default::default() }) })
	}

	fn price_estimate_page<'a>(
		&'a self,
		_: &'a EstimateRequest,
		page_token: Option<&'a str>,
	) -> RideFuture<'a, EstimatePage> {
		Box::pin(async move {
			self.page_calls.fetch_add(1, Ordering::SeqCst);

			let index = page_token.and_then(|token| token.parse::<usize>().ok()).unwrap_or(0);
			let Some((product, low)) = PRODUCTS.get(index) else {
				return Ok(EstimatePage::default());
			};

			tokio::time::sleep(Duration::from_millis(20)).await;

			Ok(EstimatePage {
				estimates: vec![PriceEstimate {
					product_id: (*product).into(),
					display_name: product.to_uppercase(),
					estimate: format!("${low:.0}-{:.0}", low * 1.3),
					low_estimate: Some(*low),
					high_estimate: Some(low * 1.3),
					..Default::default()
				}],
				next_page_token: (index + 1 < PRODUCTS.len()).then(|| (index + 1).to_string()),
			})
		})
	}

	fn upfront_fare<'a>(&'a self, request: &'a EstimateRequest) -> RideFuture<'a, UpfrontFare> {
		Box::pin(async move {
			let product = request.product_id.as_deref().unwrap_or_default();
			let Some((_, low)) = PRODUCTS.iter().find(|(id, _)| *id == product) else {
				return Err(Error::validation(format!("unknown product {product}")));
			};

			tokio::time::sleep(Duration::from_millis(10 * product.len() as u64)).await;

			Ok(UpfrontFare {
				fare: Fare {
					fare_id: format!("fare-{product}"),
					value: low * 1.1,
					currency_code: "USD".into(),
					display: format!("${:.2}", low * 1.1),
					expires_at: None,
				},
				..Default::default()
			})
		})
	}

	fn request_ride<'a>(&'a self, _: &'a RideRequest) -> RideFuture<'a, Ride> {
		Box::pin(async { Err(Error::validation("the demo does not dispatch rides")) })
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let api = Arc::new(CannedRideApi::default());
	let trip = EstimateRequest {
		start_latitude: 37.7752,
		start_longitude: -122.4185,
		end_latitude: 37.7899,
		end_longitude: -122.4026,
		..Default::default()
	};
	let estimator = FareEstimator::new(EstimatorConfig::default());
	let pairs = estimator.estimate(api.clone(), trip).await?;

	println!(
		"Quota {} reached after {} page requests.",
		estimator.config().quota,
		api.page_calls.load(Ordering::SeqCst)
	);

	for pair in pairs {
		println!(
			"{:<8} estimate {:<8} upfront {}",
			pair.estimate.product_id, pair.estimate.estimate, pair.upfront_fare.fare.display
		);
	}

	Ok(())
}
