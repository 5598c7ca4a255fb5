//! Session renewal with per-nonce single-flight guards.
//!
//! Only one renewal runs per nonce at a time. Callers that queued behind a renewal re-read the
//! store once they hold the guard and reuse the fresh token instead of spending the refresh
//! token a second time. A provider rejection removes the session so the browser is sent back
//! through the grant flow. Transient failures and rejected client credentials leave it in place.

// self
use crate::{
	_prelude::*,
	auth::{Nonce, SessionToken},
	flows::{Broker, common},
	obs::{FlowKind, FlowOutcome, FlowSpan, OutcomeCounters},
	store::OAUTH2_TABLE,
};

/// Counters for session renewals.
pub type RefreshMetrics = OutcomeCounters;

impl Broker {
	/// Renews the session stored under `nonce`, which the caller observed as `stale`.
	pub(crate) async fn refresh_session(
		&self,
		nonce: &Nonce,
		stale: SessionToken,
	) -> Result<SessionToken> {
		FlowSpan::new(FlowKind::Refresh, "refresh_session")
			.observe(async move {
				let guard = common::flow_guard(self, nonce);
				let _singleflight = guard.lock().await;

				self.refresh_metrics.record(FlowOutcome::Attempt);

				let result = self.refresh_locked(nonce, stale).await;

				self.refresh_metrics.record(FlowOutcome::of(&result));

				result
			})
			.await
	}

	async fn refresh_locked(&self, nonce: &Nonce, stale: SessionToken) -> Result<SessionToken> {
		let now = OffsetDateTime::now_utc();
		let current = match self.store.hash_get(OAUTH2_TABLE, nonce).await? {
			Some(raw) => common::decode::<SessionToken>(&raw)?,
			None => return Err(Error::AuthCorrelation { what: "nonce" }),
		};

		if !current.is_expired_at(now) {
			tracing::debug!("Session was renewed by a concurrent request.");

			return Ok(current);
		}

		let Some(refresh) = current.refresh_token.clone().or(stale.refresh_token) else {
			self.store.hash_pop(OAUTH2_TABLE, nonce).await?;

			return Err(Error::SessionExpired);
		};
		let renewed =
			match self.token_client.refresh_token(self.strategy.as_ref(), refresh.expose()).await {
				Ok(renewed) => renewed,
				Err(
					e @ (Error::InvalidGrant { .. } | Error::InsufficientScope { .. }),
				) => {
					tracing::info!(error = %e, "Provider rejected the refresh token; dropping session.");

					self.store.hash_pop(OAUTH2_TABLE, nonce).await?;

					return Err(Error::SessionExpired);
				},
				Err(e) => return Err(e),
			};
		let renewed = if renewed.refresh_token.is_some() {
			renewed
		} else {
			SessionToken { refresh_token: Some(refresh), ..renewed }
		};

		self.store.hash_set(OAUTH2_TABLE, nonce, common::encode(&renewed)?).await?;

		Ok(renewed)
	}
}
