//! axum routes exposing the broker to browser front-ends.
//!
//! | Route | Gate | Response |
//! |---|---|---|
//! | `/grant` | none | `{ "url": authorize URL }` |
//! | `/receive-oauth2` | `state` + `code` query | session cookie and `{ "Success": true }` |
//! | `/coruz` | none | `{ "api_key", "domains" }` |
//! | `/init` | origin | `Authenticated` |
//! | `/profile` | origin + session | rider profile |
//! | `/estimate-price` | session | `[{ "estimate", "upfront_fare" }]` |
//! | `/order` | session | created ride |
//! | `/deauth` | nonce in body | revoked token |

pub mod error;

pub use error::*;

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{Query, State},
	http::{HeaderMap, Uri, header::HOST},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	allowlist::{DomainAllowlist, LoginData},
	auth::{Nonce, SessionToken},
	fare::FareEstimator,
	flows::{Broker, COOKIE_NAME, SessionCookie},
	ride::{EstimateRequest, RideApiFactory, RideRequest},
};

const CALLBACK_PATH: &str = "/receive-oauth2";
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
	/// Grant and session flows.
	pub broker: Broker,
	/// Origin gate for domain-checked routes.
	pub allowlist: DomainAllowlist,
	/// Builds ride API clients for resolved sessions.
	pub rides: Arc<dyn RideApiFactory>,
	/// Fare pipeline used by `/estimate-price`.
	pub estimator: FareEstimator,
}

/// Builds the broker router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/grant", get(grant).post(grant))
		.route(CALLBACK_PATH, get(receive_oauth2))
		.route("/coruz", post(register_domains))
		.route("/init", post(init))
		.route("/profile", post(profile))
		.route("/estimate-price", post(estimate_price))
		.route("/order", post(order))
		.route("/deauth", post(deauth))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
	#[serde(default)]
	state: String,
	#[serde(default)]
	code: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DomainsBody {
	List(Vec<String>),
	Object { domains: Vec<String> },
}
impl DomainsBody {
	fn into_domains(self) -> Vec<String> {
		match self {
			Self::List(domains) | Self::Object { domains } => domains,
		}
	}
}

#[derive(Debug, Deserialize)]
struct DeauthBody {
	nonce: String,
}

async fn grant(
	State(state): State<AppState>,
	headers: HeaderMap,
	uri: Uri,
) -> Result<Response, ApiError> {
	let redirect_uri = base_url(&headers, &uri)?
		.join(CALLBACK_PATH)
		.map_err(|e| ApiError::rejected(Error::validation(format!("callback URL is invalid: {e}"))))?;
	let session = state.broker.start_grant(redirect_uri).await.map_err(ApiError::rejected)?;

	Ok(Json(serde_json::json!({ "url": session.url.as_str() })).into_response())
}

async fn receive_oauth2(
	State(state): State<AppState>,
	Query(query): Query<CallbackQuery>,
	jar: CookieJar,
) -> Result<Response, ApiError> {
	let session =
		state.broker.complete_grant(&query.state, &query.code).await.map_err(ApiError::rejected)?;
	let cookie = SessionCookie::for_session(&session, OffsetDateTime::now_utc());
	let cookie = Cookie::build((cookie.name, cookie.value.to_string()))
		.path("/")
		.http_only(true)
		.expires(cookie.expires)
		.max_age(cookie.max_age);

	tracing::info!("Login completed.");

	Ok((jar.add(cookie), Json(serde_json::json!({ "Success": true }))).into_response())
}

async fn register_domains(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Response, ApiError> {
	let domains = parse_body::<DomainsBody>(&body)?.into_domains();
	let registration =
		state.allowlist.register_new_key(&domains).await.map_err(ApiError::rejected)?;

	Ok(Json(registration).into_response())
}

async fn init(
	State(state): State<AppState>,
	headers: HeaderMap,
	uri: Uri,
	body: Bytes,
) -> Result<Response, ApiError> {
	authorize_origin(&state, &headers, &uri, &body).await?;

	Ok("Authenticated".into_response())
}

async fn profile(
	State(state): State<AppState>,
	headers: HeaderMap,
	uri: Uri,
	jar: CookieJar,
	body: Bytes,
) -> Result<Response, ApiError> {
	authorize_origin(&state, &headers, &uri, &body).await?;

	let token = resolve_session(&state, &headers, &uri, &jar).await?;
	let profile = state.rides.for_token(&token).profile().await.map_err(ApiError::rejected)?;

	Ok(Json(profile).into_response())
}

async fn estimate_price(
	State(state): State<AppState>,
	headers: HeaderMap,
	uri: Uri,
	jar: CookieJar,
	body: Bytes,
) -> Result<Response, ApiError> {
	let token = resolve_session(&state, &headers, &uri, &jar).await?;
	let request = parse_body::<EstimateRequest>(&body)?;
	let pairs = state
		.estimator
		.estimate(state.rides.for_token(&token), request)
		.await
		.map_err(ApiError::rejected)?;

	Ok(Json(pairs).into_response())
}

async fn order(
	State(state): State<AppState>,
	headers: HeaderMap,
	uri: Uri,
	jar: CookieJar,
	body: Bytes,
) -> Result<Response, ApiError> {
	let token = resolve_session(&state, &headers, &uri, &jar).await?;
	let request = parse_body::<RideRequest>(&body)?;
	let ride =
		state.rides.for_token(&token).request_ride(&request).await.map_err(ApiError::rejected)?;

	Ok(Json(ride).into_response())
}

async fn deauth(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
	let DeauthBody { nonce } = parse_body(&body)?;
	let nonce = Nonce::new(nonce.trim()).map_err(|e| ApiError::rejected(Error::validation(e)))?;
	let token = state.broker.revoke(&nonce).await.map_err(ApiError::rejected)?;

	Ok(Json(token).into_response())
}

async fn authorize_origin(
	state: &AppState,
	headers: &HeaderMap,
	uri: &Uri,
	body: &[u8],
) -> Result<(), ApiError> {
	let login = parse_body::<LoginData>(body)?;
	let request_url = base_url(headers, uri)?;

	state.allowlist.authorize_origin(&login, &request_url).await.map_err(ApiError::rejected)?;

	Ok(())
}

async fn resolve_session(
	state: &AppState,
	headers: &HeaderMap,
	uri: &Uri,
	jar: &CookieJar,
) -> Result<SessionToken, ApiError> {
	let Some(cookie) = jar.get(COOKIE_NAME) else {
		let grant_url = base_url(headers, uri)?
			.join("/grant")
			.map_err(|e| ApiError::rejected(Error::validation(format!("grant URL is invalid: {e}"))))?;

		return Err(ApiError::LoginRequired { grant_url });
	};
	let Ok(nonce) = Nonce::new(cookie.value()) else {
		return Err(ApiError::Reauthorize);
	};

	Ok(state.broker.session_token(&nonce).await?)
}

/// Reconstructs the URL the client used, from `Host`, `X-Forwarded-Proto`, and the request URI.
fn base_url(headers: &HeaderMap, uri: &Uri) -> Result<Url, ApiError> {
	let host = headers
		.get(HOST)
		.and_then(|value| value.to_str().ok())
		.or_else(|| uri.authority().map(|authority| authority.as_str()))
		.ok_or_else(|| ApiError::rejected(Error::validation("Host header is missing")))?;
	let scheme = headers
		.get(FORWARDED_PROTO)
		.and_then(|value| value.to_str().ok())
		.or_else(|| uri.scheme_str())
		.unwrap_or("http");
	let path = uri.path_and_query().map(|path| path.as_str()).unwrap_or("/");

	Url::parse(&format!("{scheme}://{host}{path}"))
		.map_err(|e| ApiError::rejected(Error::validation(format!("request URL is invalid: {e}"))))
}

fn parse_body<T>(body: &[u8]) -> Result<T, ApiError>
where
	T: DeserializeOwned,
{
	let de = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(de)
		.map_err(|e| ApiError::rejected(Error::validation(format!("malformed body: {e}"))))
}
