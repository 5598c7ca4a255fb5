//! HTTP rendering of broker failures.

// crates.io
use axum::{
	Json,
	http::{StatusCode, header::LOCATION},
	response::{IntoResponse, Response},
};
// self
use crate::_prelude::*;

/// Path the client is sent to when it must log in again.
pub const GRANT_PATH: &str = "/grant";

/// Failure returned by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
	/// The request carried no session cookie; the body tells the client where to log in.
	LoginRequired {
		/// Absolute URL of the grant endpoint.
		grant_url: Url,
	},
	/// The session is unknown, revoked, or expired; answered with a permanent redirect.
	Reauthorize,
	/// Any other broker failure, rendered as an error body.
	Broker(Error),
}
impl ApiError {
	/// Wraps `e` without turning login-required failures into redirects.
	pub fn rejected(e: Error) -> Self {
		Self::Broker(e)
	}
}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		if e.requires_login() { Self::Reauthorize } else { Self::Broker(e) }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			Self::LoginRequired { grant_url } =>
				Json(serde_json::json!({ "url": grant_url.as_str() })).into_response(),
			Self::Reauthorize =>
				(StatusCode::PERMANENT_REDIRECT, [(LOCATION, GRANT_PATH)]).into_response(),
			Self::Broker(e) => {
				let status = status_code(&e);

				if status.is_server_error() {
					tracing::warn!(status = status.as_u16(), error = %e, "Request failed.");
				}

				(status, Json(ErrorBody::from(&e))).into_response()
			},
		}
	}
}

/// Error envelope: `{ "errors": [ { "reason", "details" } ] }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Reported errors; the broker always sends one.
	pub errors: Vec<ErrorEntry>,
}
impl From<&Error> for ErrorBody {
	fn from(e: &Error) -> Self {
		let details = match e {
			Error::AuthCorrelation { what: "state" } =>
				"failed to correlate the found state. Please try again".to_owned(),
			other => other.to_string(),
		};

		Self { errors: vec![ErrorEntry { reason: reason(e).to_owned(), details }] }
	}
}

/// One reported error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
	/// Stable machine-readable category.
	pub reason: String,
	/// Human-readable description.
	pub details: String,
}

/// HTTP status for a broker error.
pub fn status_code(e: &Error) -> StatusCode {
	match e {
		Error::Validation { .. } | Error::AuthCorrelation { .. } | Error::InvalidGrant { .. } =>
			StatusCode::BAD_REQUEST,
		Error::SessionExpired | Error::DomainNotAllowed { .. } => StatusCode::UNAUTHORIZED,
		Error::InsufficientScope { .. } => StatusCode::FORBIDDEN,
		Error::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
		Error::Upstream(_)
		| Error::Transient(_)
		| Error::Transport(_)
		| Error::InvalidClient { .. } => StatusCode::BAD_GATEWAY,
		Error::Storage(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

fn reason(e: &Error) -> &'static str {
	match e {
		Error::Storage(_) => "storage",
		Error::StoreUnavailable { .. } => "store_unavailable",
		Error::Config(_) => "config",
		Error::Transient(_) | Error::Transport(_) => "token_endpoint",
		Error::Upstream(_) => "upstream",
		Error::Validation { .. } => "validation",
		Error::AuthCorrelation { .. } => "auth_correlation",
		Error::SessionExpired => "session_expired",
		Error::DomainNotAllowed { .. } => "domain_not_allowed",
		Error::InsufficientScope { .. } => "insufficient_scope",
		Error::InvalidGrant { .. } => "invalid_grant",
		Error::InvalidClient { .. } => "invalid_client",
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::UpstreamError, store::StoreError};

	#[test]
	fn status_codes_keep_store_outages_apart_from_misses() {
		let unavailable = Error::StoreUnavailable {
			operation: "hash_get",
			attempts: 10,
			source: StoreError::Connection { message: "refused".into() },
		};

		assert_eq!(status_code(&unavailable), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(status_code(&Error::AuthCorrelation { what: "nonce" }), StatusCode::BAD_REQUEST);
		assert_eq!(
			status_code(&Error::DomainNotAllowed { domain: "evil.example".into() }),
			StatusCode::UNAUTHORIZED
		);
		assert_eq!(
			status_code(&UpstreamError::Other { endpoint: "profile", message: "boom".into() }.into()),
			StatusCode::BAD_GATEWAY
		);
	}

	#[test]
	fn callback_correlation_failures_use_the_retry_message() {
		let body = ErrorBody::from(&Error::AuthCorrelation { what: "state" });

		assert_eq!(body.errors.len(), 1);
		assert_eq!(body.errors[0].reason, "auth_correlation");
		assert_eq!(body.errors[0].details, "failed to correlate the found state. Please try again");
	}

	#[test]
	fn login_failures_become_redirects_only_through_from() {
		assert!(matches!(ApiError::from(Error::SessionExpired), ApiError::Reauthorize));
		assert!(matches!(
			ApiError::rejected(Error::AuthCorrelation { what: "state" }),
			ApiError::Broker(_)
		));
	}
}
