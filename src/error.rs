//! Broker-level error types shared across flows, stores, the allow-list, and the fare pipeline.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Logical storage failure (bad payload, backend rejected the command).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// The store stayed unreachable after the reconnect budget was spent.
	#[error("Store is unavailable: `{operation}` failed after {attempts} reconnect attempts.")]
	StoreUnavailable {
		/// Store operation that could not be completed.
		operation: &'static str,
		/// Reconnect attempts performed before giving up.
		attempts: usize,
		/// Last connection-level failure observed.
		#[source]
		source: crate::store::StoreError,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary token endpoint failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS) while talking to the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Ride API failure, propagated with upstream detail.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Malformed or missing request fields.
	#[error("Invalid request: {reason}.")]
	Validation {
		/// Human-readable description of the offending field.
		reason: String,
	},
	/// Unknown, replayed, or revoked `state`/nonce.
	#[error("No pending grant or session matches the supplied {what}.")]
	AuthCorrelation {
		/// Which correlation value missed (`state` or `nonce`).
		what: &'static str,
	},
	/// Session token is past its expiry and could not be renewed.
	#[error("Session has expired; restart the grant flow.")]
	SessionExpired,
	/// Origin is not registered for the API key.
	#[error("Domain `{domain}` is not allowed for this API key.")]
	DomainNotAllowed {
		/// Host that failed the allow-list check.
		domain: String,
	},

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Builds a [`Error::Validation`] from any displayable reason.
	pub fn validation(reason: impl Display) -> Self {
		Self::Validation { reason: reason.to_string() }
	}

	/// Returns `true` when the caller should be sent back to the grant flow.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::AuthCorrelation { .. } | Self::SessionExpired)
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Token record builder validation failed.
	#[error("Unable to build session token.")]
	TokenBuild(#[from] crate::auth::SessionTokenBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures reported by the upstream ride API.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// The ride API answered with a non-success status.
	#[error("Ride API `{endpoint}` returned HTTP {status}: {body}.")]
	Status {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		body: String,
	},
	/// The request never produced a response.
	#[error("Ride API `{endpoint}` could not be reached.")]
	Network {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Transport failure.
		#[source]
		source: BoxError,
	},
	/// The response body did not match the expected shape.
	#[error("Ride API `{endpoint}` returned malformed JSON.")]
	Decode {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Any other upstream failure (custom clients, test doubles).
	#[error("Ride API `{endpoint}` failed: {message}.")]
	Other {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Failure description.
		message: String,
	},
}
impl UpstreamError {
	/// Wraps a transport failure for the given endpoint.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_required_only_for_correlation_failures() {
		assert!(Error::AuthCorrelation { what: "state" }.requires_login());
		assert!(Error::SessionExpired.requires_login());
		assert!(!Error::validation("api_key is blank").requires_login());
		assert!(!Error::DomainNotAllowed { domain: "evil.example".into() }.requires_login());
	}

	#[test]
	fn upstream_errors_render_endpoint_and_status() {
		let err = Error::from(UpstreamError::Status {
			endpoint: "upfront_fare",
			status: 422,
			body: "distance_exceeded".into(),
		});

		assert_eq!(
			err.to_string(),
			"Ride API `upfront_fare` returned HTTP 422: distance_exceeded."
		);
	}
}
