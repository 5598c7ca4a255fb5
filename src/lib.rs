//! OAuth 2.0 session broker for ride-hailing front-ends: nonce-keyed sessions in a shared
//! key-value store, per-API-key origin allow-lists, and bounded-concurrency fare estimation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod allowlist;
#[cfg(feature = "server")] pub mod api;
pub mod auth;
#[cfg(feature = "server")] pub mod config;
pub mod error;
pub mod fare;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod ride;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _};
