//! Token endpoint error classification.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Hook that maps token endpoint failures onto [`ProviderErrorKind`].
///
/// The context carries only primitive data so strategies stay independent of the HTTP stack.
pub trait ProviderStrategy: Send + Sync {
	/// Classifies a failed token request.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical provider error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the code or refresh token.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the client may obtain.
	InsufficientScope,
	/// Temporary failure.
	Transient,
}

/// Failure details handed to [`ProviderStrategy::classify_token_error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
}
impl ProviderErrorContext {
	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self { grant_type, http_status: None, oauth_error: None, error_description: None }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}
}

/// Strategy following RFC 6749 error codes, falling back to the HTTP status.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		ctx.oauth_error
			.as_deref()
			.and_then(classify_code)
			.or_else(|| ctx.error_description.as_deref().and_then(classify_text))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn classify_code(code: &str) -> Option<ProviderErrorKind> {
	match code.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" => Some(ProviderErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ProviderErrorKind::InvalidClient),
		"invalid_scope" | "insufficient_scope" => Some(ProviderErrorKind::InsufficientScope),
		"temporarily_unavailable" | "server_error" => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_text(text: &str) -> Option<ProviderErrorKind> {
	let lowered = text.to_ascii_lowercase();

	["invalid_grant", "invalid_client", "insufficient_scope", "invalid_scope"]
		.into_iter()
		.find(|code| lowered.contains(code))
		.and_then(classify_code)
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_codes_take_precedence_over_status() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_oauth_error("invalid_grant")
			.with_http_status(500);

		assert_eq!(DefaultProviderStrategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn description_and_status_fallbacks() {
		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_oauth_error("custom_error")
			.with_error_description("The client is invalid_client for this provider");

		assert_eq!(DefaultProviderStrategy.classify_token_error(&ctx), ProviderErrorKind::InvalidClient);

		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode).with_http_status(403);

		assert_eq!(
			DefaultProviderStrategy.classify_token_error(&ctx),
			ProviderErrorKind::InsufficientScope
		);
		assert_eq!(
			DefaultProviderStrategy
				.classify_token_error(&ProviderErrorContext::new(GrantType::RefreshToken)),
			ProviderErrorKind::Transient
		);
	}
}
