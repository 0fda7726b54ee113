//! Referral registration service — OAuth-secured, mTLS-bound, OPRF-pseudonymized
//! synchronization between a metadata source and the national referral index.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod bundle;
pub mod config;
pub mod domain;
pub mod error;
pub mod fhir;
pub mod http;
pub mod metadata;
pub mod nvi;
pub mod obs;
pub mod oprf;
pub mod pseudonym;
pub mod registration;
pub mod scheduler;
pub mod sync;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::http::HttpTransport;

	/// Builds a reqwest client that accepts the self-signed certificates `httpmock` serves
	/// over its `https` feature.
	pub fn test_reqwest_http_client() -> HttpTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		HttpTransport::with_client(client)
	}
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
