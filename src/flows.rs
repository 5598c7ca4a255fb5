//! Nonce-keyed OAuth 2.0 session flows.
//!
//! A login starts with [`Broker::start_grant`], which mints a nonce plus an independent
//! `state`, parks the pending grant under `state`, and returns the provider authorize URL.
//! The provider redirects back with `state` and `code`; [`Broker::complete_grant`] consumes the
//! pending grant exactly once, exchanges the code, and stores the token under the nonce. The
//! nonce is the only thing the browser keeps (as a cookie). Later requests resolve the token
//! with [`Broker::session_token`], which renews expired tokens through their refresh token, and
//! [`Broker::revoke`] removes it.

pub mod common;
pub mod grant;
pub mod refresh;
pub mod session;

pub use grant::*;
pub use refresh::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::Nonce,
	http::ReqwestHttpClient,
	oauth::TokenClient,
	provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
	store::StoreManager,
};

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 5] = ["profile", "history", "places", "request", "request_receipt"];

/// Coordinates the grant and session lifecycle against one provider.
///
/// Cloning is cheap; clones share the store, the token client, and the per-nonce guards.
#[derive(Clone)]
pub struct Broker {
	/// Shared store handle.
	pub store: Arc<StoreManager>,
	/// Provider descriptor that defines OAuth endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy used to classify token endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Scopes requested on every grant.
	pub scopes: Vec<String>,
	/// Shared counters for session refreshes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	token_client: Arc<TokenClient>,
	flow_guards: Arc<Mutex<HashMap<Nonce, Arc<AsyncMutex<()>>>>>,
}
impl Broker {
	/// Creates a broker with the default reqwest transport.
	pub fn new(
		store: Arc<StoreManager>,
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		client_secret: &str,
	) -> Result<Self> {
		Self::with_http_client(store, descriptor, client_id, client_secret, ReqwestHttpClient::new()?)
	}

	/// Creates a broker that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<StoreManager>,
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		client_secret: &str,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let client_id = client_id.into();
		let token_client =
			TokenClient::from_descriptor(&descriptor, &client_id, client_secret, http_client)?;

		Ok(Self {
			store,
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
			client_id,
			scopes: DEFAULT_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
			refresh_metrics: Default::default(),
			token_client: Arc::new(token_client),
			flow_guards: Default::default(),
		})
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("scopes", &self.scopes)
			.field("store", &self.store)
			.finish()
	}
}
