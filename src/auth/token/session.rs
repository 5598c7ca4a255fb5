//! Session token stored under a nonce, with lifecycle helpers and a builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Lifecycle status of a stored session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
	/// Token is usable.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// Errors produced by [`SessionTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// OAuth 2.0 token material persisted in the `oauth2` table, keyed by nonce.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
	/// Access token presented to the ride API.
	pub access_token: TokenSecret,
	/// Token type reported by the provider (usually `Bearer`).
	pub token_type: String,
	/// Refresh token, when the provider granted offline access.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Instant the broker received the token.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Expiry instant; mirrored into the session cookie.
	#[serde(rename = "expiry", with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl SessionToken {
	/// Returns a builder for assembling tokens from provider responses.
	pub fn builder() -> SessionTokenBuilder {
		SessionTokenBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> SessionStatus {
		if instant >= self.expires_at { SessionStatus::Expired } else { SessionStatus::Active }
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), SessionStatus::Expired)
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Serializes the token into the JSON stored by the broker.
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// Parses a token previously written by [`SessionToken::to_json`].
	pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(raw)
	}
}
impl Debug for SessionToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`SessionToken`].
#[derive(Clone, Debug, Default)]
pub struct SessionTokenBuilder {
	access_token: Option<TokenSecret>,
	token_type: Option<String>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl SessionTokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`SessionToken`].
	pub fn build(self) -> Result<SessionToken, SessionTokenBuilderError> {
		let access_token = self.access_token.ok_or(SessionTokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(SessionTokenBuilderError::MissingExpiry),
		};

		Ok(SessionToken {
			access_token,
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn fixture() -> SessionToken {
		SessionToken::builder()
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Session token fixture should build.")
	}

	#[test]
	fn builder_handles_relative_expiry_and_default_type() {
		let token = fixture();

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert_eq!(token.token_type, "Bearer");
	}

	#[test]
	fn builder_requires_access_token_and_expiry() {
		assert_eq!(
			SessionToken::builder().expires_in(Duration::minutes(1)).build(),
			Err(SessionTokenBuilderError::MissingAccessToken)
		);
		assert_eq!(
			SessionToken::builder().access_token("a").build(),
			Err(SessionTokenBuilderError::MissingExpiry)
		);
	}

	#[test]
	fn status_and_remaining_follow_expiry() {
		let token = fixture();

		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:10 UTC)), SessionStatus::Active);
		assert!(token.is_expired_at(macros::datetime!(2025-01-01 00:30 UTC)));
		assert_eq!(
			token.remaining_at(macros::datetime!(2025-01-01 00:20 UTC)),
			Duration::minutes(10)
		);
		assert_eq!(token.remaining_at(macros::datetime!(2025-01-02 00:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn json_payload_round_trips_and_debug_redacts() {
		let token = fixture();
		let raw = token.to_json().expect("Token should serialize.");

		assert!(raw.contains("\"expiry\":\"2025-01-01T00:30:00Z\""));
		assert_eq!(SessionToken::from_json(&raw).expect("Token should parse."), token);

		let debug = format!("{token:?}");

		assert!(!debug.contains("access\""));
		assert!(debug.contains("<redacted>"));
	}
}
