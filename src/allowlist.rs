//! Per-API-key origin allow-list backed by set tables named after the key.
//!
//! Membership is exact string match on the origin host (including an explicit port). The
//! wildcard member [`ANY_DOMAIN`] admits every origin.

pub mod usage;

pub use usage::*;

// crates.io
use futures::future;
// self
use crate::{_prelude::*, auth::ApiKey, store::StoreManager};

/// Set member that allows every origin for a key.
pub const ANY_DOMAIN: &str = "*";

/// Partition of candidate domains by allow-list membership.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DomainFilter {
	/// Domains registered for the key (in input order).
	pub allowed: Vec<String>,
	/// Domains the key may not use (in input order).
	pub not_allowed: Vec<String>,
}

/// Freshly minted API key and the domains registered under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRegistration {
	/// Generated key handed to the front-end.
	pub api_key: ApiKey,
	/// Domains (or `*`) registered for the key.
	pub domains: Vec<String>,
}

/// Login body posted by a front-end before any session exists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LoginData {
	/// API key issued at registration.
	#[serde(default)]
	pub api_key: String,
	/// Page origin (URL) the front-end is served from.
	#[serde(default)]
	pub origin: String,
}

/// Allow-list checks and registration over the shared store.
#[derive(Clone, Debug)]
pub struct DomainAllowlist {
	store: Arc<StoreManager>,
	usage: UsageRecorder,
}
impl DomainAllowlist {
	/// Creates an allow-list over `store`, recording usage to the same store.
	pub fn new(store: Arc<StoreManager>) -> Self {
		Self { usage: UsageRecorder::new(store.clone()), store }
	}

	/// Splits `domains` into allowed and not-allowed for `api_key`.
	///
	/// A wildcard registration allows everything without per-domain lookups. Otherwise each
	/// domain is checked concurrently; any store failure aborts the whole call so callers fail
	/// closed.
	pub async fn filter_allowed_domains(
		&self,
		api_key: &ApiKey,
		domains: &[String],
	) -> Result<DomainFilter> {
		if self.store.set_is_member(api_key, ANY_DOMAIN).await? {
			return Ok(DomainFilter { allowed: domains.to_vec(), not_allowed: Vec::new() });
		}

		let checks = future::try_join_all(
			domains.iter().map(|domain| self.store.set_is_member(api_key, domain)),
		)
		.await?;
		let mut filter = DomainFilter::default();

		for (domain, allowed) in domains.iter().zip(checks) {
			if allowed {
				filter.allowed.push(domain.clone());
			} else {
				filter.not_allowed.push(domain.clone());
			}
		}

		tracing::debug!(
			allowed = filter.allowed.len(),
			not_allowed = filter.not_allowed.len(),
			"Filtered domains against the allow-list."
		);

		Ok(filter)
	}

	/// Returns `true` when `domain` alone passes the allow-list for `api_key`.
	pub async fn is_domain_allowed(&self, api_key: &ApiKey, domain: &str) -> Result<bool> {
		let filter = self.filter_allowed_domains(api_key, &[domain.to_owned()]).await?;

		Ok(matches!(filter.allowed.as_slice(), [only] if only == domain))
	}

	/// Adds `domains` to the key's set; repeated registrations are no-ops.
	pub async fn register_domains(&self, api_key: &ApiKey, domains: &[String]) -> Result<()> {
		let domains = normalize_domains(domains)?;

		self.store.set_add(api_key, &domains).await
	}

	/// Mints a new API key and registers `domains` under it.
	pub async fn register_new_key(&self, domains: &[String]) -> Result<ApiKeyRegistration> {
		let domains = normalize_domains(domains)?;
		let api_key = ApiKey::generate();

		self.store.set_add(&api_key, &domains).await?;
		tracing::info!(domains = domains.len(), "Registered a new API key.");

		Ok(ApiKeyRegistration { api_key, domains })
	}

	/// Gates a request by the origin posted in `login`.
	///
	/// Records usage for `request_url` (best effort) once the key is well-formed, then checks the
	/// origin host. Returns the parsed key on success.
	pub async fn authorize_origin(&self, login: &LoginData, request_url: &Url) -> Result<ApiKey> {
		if login.api_key.trim().is_empty() {
			return Err(Error::validation("api_key is blank"));
		}

		let api_key = ApiKey::new(login.api_key.trim()).map_err(Error::validation)?;

		self.usage.record(request_url);

		if login.origin.trim().is_empty() {
			return Err(Error::validation("origin is blank"));
		}

		let origin = Url::parse(login.origin.trim())
			.map_err(|e| Error::validation(format!("origin is not a URL: {e}")))?;
		let domain = origin_host(&origin)
			.ok_or_else(|| Error::validation("origin has no host"))?;

		if self.is_domain_allowed(&api_key, &domain).await? {
			Ok(api_key)
		} else {
			Err(Error::DomainNotAllowed { domain })
		}
	}
}

fn normalize_domains(domains: &[String]) -> Result<Vec<String>> {
	let domains: Vec<_> = domains
		.iter()
		.map(|domain| domain.trim())
		.filter(|domain| !domain.is_empty())
		.map(str::to_owned)
		.collect();

	if domains.is_empty() {
		return Err(Error::validation("at least one domain is required"));
	}

	Ok(domains)
}

fn origin_host(origin: &Url) -> Option<String> {
	let host = origin.host_str()?;

	Some(match origin.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_owned(),
	})
}
