//! Token endpoint client built on the `oauth2` crate.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{
		BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::SessionToken,
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Confidential client for the provider's token endpoint.
pub(crate) struct TokenClient {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
}
impl TokenClient {
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if matches!(descriptor.client_auth, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}

	/// Redeems an authorization code, replaying the redirect URI and PKCE verifier of the grant.
	pub(crate) async fn exchange_authorization_code(
		&self,
		strategy: &dyn ProviderStrategy,
		code: &str,
		pkce_verifier: &str,
		redirect_uri: &Url,
	) -> Result<SessionToken> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|e| map_request_error(strategy, GrantType::AuthorizationCode, meta.take(), e))?;

		session_token_from(response)
	}

	/// Trades a refresh token for a new session token.
	///
	/// Providers that do not rotate refresh tokens omit one from the response; the caller keeps
	/// the previous value in that case.
	pub(crate) async fn refresh_token(
		&self,
		strategy: &dyn ProviderStrategy,
		refresh_token: &str,
	) -> Result<SessionToken> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|e| map_request_error(strategy, GrantType::RefreshToken, meta.take(), e))?;

		session_token_from(response)
	}
}

fn session_token_from(response: BasicTokenResponse) -> Result<SessionToken> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let token_type = match response.token_type() {
		BasicTokenType::Bearer => "Bearer".to_owned(),
		BasicTokenType::Mac => "MAC".to_owned(),
		BasicTokenType::Extension(other) => other.clone(),
	};
	let mut builder = SessionToken::builder()
		.access_token(response.access_token().secret().to_owned())
		.token_type(token_type)
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in));

	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.as_ref().and_then(|m| m.status);
	let retry_after = meta.as_ref().and_then(|m| m.retry_after);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response(strategy, grant, response, status, retry_after),
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
			map_reqwest_error(*inner, status, retry_after),
		RequestTokenError::Request(HttpClientError::Http(inner)) => ConfigError::from(inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(other) => TransientError::TokenEndpoint {
			message: format!("HTTP client error: {other}"),
			status,
			retry_after,
		}
		.into(),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source, status }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status, retry_after }.into(),
	}
}

fn map_server_response(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let mut ctx = ProviderErrorContext::new(grant).with_oauth_error(code.clone());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = status {
		ctx = ctx.with_http_status(status);
	}

	let reason = response.error_description().cloned().unwrap_or(code);

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason },
		ProviderErrorKind::Transient =>
			TransientError::TokenEndpoint { message: reason, status, retry_after }.into(),
	}
}

fn map_reqwest_error(
	err: ReqwestError,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out".into(),
			status: status.or_else(|| err.status().map(|code| code.as_u16())),
			retry_after,
		}
		.into();
	}

	TransportError::from(err).into()
}
