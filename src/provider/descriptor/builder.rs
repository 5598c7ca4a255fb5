// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints, ProviderQuirks},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// A required endpoint was never set.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is missing.
		endpoint: &'static str,
	},
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	id: ProviderId,
	authorization: Option<Url>,
	token: Option<Url>,
	ride_api: Option<Url>,
	client_auth: ClientAuthMethod,
	quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization: None,
			token: None,
			ride_api: None,
			client_auth: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token = Some(url);

		self
	}

	/// Sets the ride API base URL.
	pub fn ride_api_base(mut self, url: Url) -> Self {
		self.ride_api = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = method;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = require("authorization", self.authorization)?;
		let token = require("token", self.token)?;
		let ride_api = require("ride_api", self.ride_api)?;

		if self.quirks.scope_delimiter.is_control() {
			return Err(ProviderDescriptorError::InvalidScopeDelimiter {
				delimiter: self.quirks.scope_delimiter,
			});
		}

		Ok(ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token, ride_api },
			client_auth: self.client_auth,
			quirks: self.quirks,
		})
	}
}

fn require(endpoint: &'static str, url: Option<Url>) -> Result<Url, ProviderDescriptorError> {
	let url = url.ok_or(ProviderDescriptorError::MissingEndpoint { endpoint })?;

	if url.scheme() != "https" {
		return Err(ProviderDescriptorError::InsecureEndpoint { endpoint, url: url.to_string() });
	}

	Ok(url)
}
