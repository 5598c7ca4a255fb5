//! Grant issuance and callback completion.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Nonce, SessionToken, random_string},
	flows::{Broker, common},
	obs::{FlowKind, FlowSpan},
	store::{OAUTH2_TABLE, STATE_TABLE},
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Authorize URL plus the correlation values minted for one login attempt.
#[derive(Clone, Debug)]
pub struct GrantSession {
	/// Provider authorize URL the end-user should open.
	pub url: Url,
	/// Single-use correlation value echoed back by the provider.
	pub state: String,
	/// Session handle the token will be stored under.
	pub nonce: Nonce,
}

/// Record parked in the state table between the grant and its callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGrant {
	/// Nonce the resulting token will be stored under.
	pub nonce: Nonce,
	/// Redirect URI used in the authorize URL; the code exchange must repeat it.
	pub redirect_uri: Url,
	/// PKCE verifier matching the challenge in the authorize URL.
	pub pkce_verifier: String,
}
impl Debug for PendingGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingGrant")
			.field("nonce", &self.nonce)
			.field("redirect_uri", &self.redirect_uri)
			.field("pkce_verifier", &"<redacted>")
			.finish()
	}
}

/// Outcome of a successful callback.
#[derive(Clone, Debug)]
pub struct AuthorizedSession {
	/// Nonce the token is stored under; becomes the session cookie value.
	pub nonce: Nonce,
	/// Token obtained from the provider.
	pub token: SessionToken,
}

struct PkcePair {
	verifier: String,
	challenge: String,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

		Self { verifier, challenge }
	}
}

impl Broker {
	/// Mints a nonce and `state`, parks the pending grant, and builds the authorize URL.
	pub async fn start_grant(&self, redirect_uri: Url) -> Result<GrantSession> {
		FlowSpan::new(FlowKind::Grant, "start_grant")
			.observe(async move {
				let nonce = Nonce::generate();
				let state = random_string(STATE_LEN);
				let pkce = PkcePair::generate();
				let url = self.authorize_url(&redirect_uri, &state, &pkce);
				let pending = PendingGrant {
					nonce: nonce.clone(),
					redirect_uri,
					pkce_verifier: pkce.verifier,
				};

				self.store.hash_set(STATE_TABLE, &state, common::encode(&pending)?).await?;

				Ok(GrantSession { url, state, nonce })
			})
			.await
	}

	/// Consumes the pending grant for `state`, exchanges `code`, and stores the token.
	///
	/// An unknown or already-consumed `state` fails with [`Error::AuthCorrelation`] before any
	/// call to the token endpoint.
	pub async fn complete_grant(&self, state: &str, code: &str) -> Result<AuthorizedSession> {
		FlowSpan::new(FlowKind::Callback, "complete_grant")
			.observe(async move {
				if state.trim().is_empty() {
					return Err(Error::validation("state is blank"));
				}
				if code.trim().is_empty() {
					return Err(Error::validation("code is blank"));
				}

				let raw = self
					.store
					.hash_pop(STATE_TABLE, state)
					.await?
					.ok_or(Error::AuthCorrelation { what: "state" })?;
				let pending: PendingGrant = common::decode(&raw)?;
				let token = self
					.token_client
					.exchange_authorization_code(
						self.strategy.as_ref(),
						code,
						&pending.pkce_verifier,
						&pending.redirect_uri,
					)
					.await?;

				self.store.hash_set(OAUTH2_TABLE, &pending.nonce, common::encode(&token)?).await?;

				Ok(AuthorizedSession { nonce: pending.nonce, token })
			})
			.await
	}

	fn authorize_url(&self, redirect_uri: &Url, state: &str, pkce: &PkcePair) -> Url {
		let mut url = self.descriptor.endpoints.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.client_id);
		pairs.append_pair("redirect_uri", redirect_uri.as_str());

		if let Some(scope) = common::format_scope(&self.scopes, self.descriptor.quirks.scope_delimiter)
		{
			pairs.append_pair("scope", &scope);
		}

		pairs.append_pair("state", state);

		if self.descriptor.quirks.access_type_offline {
			pairs.append_pair("access_type", "offline");
		}

		pairs.append_pair("code_challenge", &pkce.challenge);
		pairs.append_pair("code_challenge_method", "S256");

		drop(pairs);

		url
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn pkce_challenge_is_s256_of_verifier() {
		let pkce = PkcePair::generate();

		assert_eq!(pkce.verifier.len(), PKCE_VERIFIER_LEN);
		assert_eq!(pkce.challenge, URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier.as_bytes())));
		assert!(!pkce.challenge.contains('='));
	}

	#[test]
	fn pending_grant_debug_hides_verifier() {
		let pending = PendingGrant {
			nonce: Nonce::generate(),
			redirect_uri: Url::parse("https://broker.example.com/receive-oauth2")
				.expect("Redirect fixture should parse."),
			pkce_verifier: "verifier-value".into(),
		};
		let debug = format!("{pending:?}");

		assert!(!debug.contains("verifier-value"));
	}
}
