//! Strongly typed identifiers enforced across the broker domain.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const NONCE_LEN: usize = 32;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} cannot be blank.")]
	Empty {
		/// Kind of identifier (api key, nonce, provider).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (api key, nonce, provider).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (api key, nonce, provider).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ApiKey, "API key identifying a registered front-end.", "api_key" }
def_id! { Nonce, "Single-use value correlating a login attempt with its stored session.", "nonce" }
def_id! { ProviderId, "Identifier for an OAuth provider descriptor.", "provider" }

impl ApiKey {
	/// Mints a fresh random (UUID v4) API key.
	pub fn generate() -> Self {
		Self(Uuid::new_v4().to_string())
	}
}
impl Debug for ApiKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ApiKey({})", self.0)
	}
}

impl Nonce {
	/// Mints a fresh nonce from the thread-local CSPRNG.
	pub fn generate() -> Self {
		Self(random_string(NONCE_LEN))
	}
}
impl Debug for Nonce {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Nonces double as bearer session handles.
		f.write_str("Nonce(<redacted>)")
	}
}

impl Debug for ProviderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ProviderId({})", self.0)
	}
}

/// Returns `len` alphanumeric characters drawn from the thread-local CSPRNG.
pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn identifiers_reject_blank_and_whitespace() {
		assert!(ApiKey::new("").is_err(), "Blank API keys must be rejected.");
		assert!(ApiKey::new(" key").is_err(), "Leading whitespace must be rejected.");
		assert!(Nonce::new("with space").is_err());

		let key = ApiKey::new("3f1c2b9e-key").expect("API key fixture should be valid.");

		assert_eq!(key.as_ref(), "3f1c2b9e-key");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let key: ApiKey =
			serde_json::from_str("\"key-42\"").expect("API key should deserialize successfully.");

		assert_eq!(key.as_ref(), "key-42");
		assert!(serde_json::from_str::<ApiKey>("\"\"").is_err());
		assert!(serde_json::from_str::<Nonce>("\"a b\"").is_err());
	}

	#[test]
	fn generated_values_are_unique_and_valid() {
		let nonces: HashSet<_> = (0..64).map(|_| Nonce::generate()).collect();

		assert_eq!(nonces.len(), 64);
		assert!(nonces.iter().all(|nonce| nonce.len() == NONCE_LEN));

		let key = ApiKey::generate();

		assert!(ApiKey::new(key.as_ref()).is_ok());
		assert_ne!(key, ApiKey::generate());
	}

	#[test]
	fn nonce_debug_is_redacted() {
		let nonce = Nonce::new("secret-nonce").expect("Nonce fixture should be valid.");

		assert_eq!(format!("{nonce:?}"), "Nonce(<redacted>)");
		assert_eq!(nonce.to_string(), "secret-nonce");
	}

	#[test]
	fn length_limit_is_enforced() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		ApiKey::new(&exact).expect("Exact length should succeed.");

		assert!(ApiKey::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}
}
