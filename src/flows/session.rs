//! Session lookup, revocation, and the cookie carrying the nonce.

// self
use crate::{
	_prelude::*,
	auth::{Nonce, SessionToken},
	flows::{AuthorizedSession, Broker, common},
	obs::{FlowKind, FlowSpan},
	store::OAUTH2_TABLE,
};

/// Name of the cookie holding the session nonce.
pub const COOKIE_NAME: &str = "uberclick-nonce";

/// Session cookie contents: the nonce plus an expiry mirrored from the token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
	/// Cookie name, always [`COOKIE_NAME`].
	pub name: &'static str,
	/// Nonce the session is stored under.
	pub value: Nonce,
	/// Absolute expiry (the token's expiry).
	pub expires: OffsetDateTime,
	/// Lifetime left at issuance, clamped at zero.
	pub max_age: Duration,
}
impl SessionCookie {
	/// Builds the cookie for a freshly authorized session as seen at `now`.
	pub fn for_session(session: &AuthorizedSession, now: OffsetDateTime) -> Self {
		Self {
			name: COOKIE_NAME,
			value: session.nonce.clone(),
			expires: session.token.expires_at,
			max_age: session.token.remaining_at(now),
		}
	}
}

impl Broker {
	/// Resolves the session token stored under `nonce` without consuming it.
	///
	/// Expired tokens are renewed through their refresh token; a session that cannot be renewed
	/// is removed and reported as [`Error::SessionExpired`]. An unknown nonce yields
	/// [`Error::AuthCorrelation`].
	pub async fn session_token(&self, nonce: &Nonce) -> Result<SessionToken> {
		FlowSpan::new(FlowKind::Session, "session_token")
			.observe(async move {
				let raw = self
					.store
					.hash_get(OAUTH2_TABLE, nonce)
					.await?
					.ok_or(Error::AuthCorrelation { what: "nonce" })?;
				let token: SessionToken = common::decode(&raw)?;

				if token.is_expired_at(OffsetDateTime::now_utc()) {
					return self.refresh_session(nonce, token).await;
				}

				Ok(token)
			})
			.await
	}

	/// Removes the session stored under `nonce` and returns its token.
	///
	/// Waits for an in-flight renewal of the same session so the renewed token cannot be written
	/// back after removal.
	pub async fn revoke(&self, nonce: &Nonce) -> Result<SessionToken> {
		FlowSpan::new(FlowKind::Revoke, "revoke")
			.observe(async move {
				let guard = common::flow_guard(self, nonce);
				let _singleflight = guard.lock().await;
				let raw = self
					.store
					.hash_pop(OAUTH2_TABLE, nonce)
					.await?
					.ok_or(Error::AuthCorrelation { what: "nonce" })?;

				tracing::info!("Session revoked.");

				common::decode(&raw)
			})
			.await
	}
}
