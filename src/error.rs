//! Service-level error types shared across clients, sync, and registration flows.

// self
use crate::_prelude::*;

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical service error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem (missing/invalid certificates, malformed identifiers).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) underneath any upstream call.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// OAuth token acquisition failed.
	#[error(transparent)]
	TokenFetch(#[from] TokenFetchError),
	/// Pseudonym service call failed.
	#[error(transparent)]
	Pseudonym(#[from] PseudonymError),
	/// NVI call failed.
	#[error(transparent)]
	Nvi(#[from] NviError),
	/// Metadata-source call failed.
	#[error(transparent)]
	Metadata(#[from] MetadataError),

	/// The resource was missing a required field or reference the service could map.
	#[error("Resource is invalid: {reason}.")]
	InvalidResource {
		/// Human-readable reason the resource was rejected.
		reason: String,
	},
	/// The referral already existed and was not re-registered.
	#[error("Referral already exists for this patient/recipient pair.")]
	DuplicateReferral,
	/// An upstream dependency failed its health check.
	#[error("Upstream `{upstream}` is unhealthy.")]
	UnhealthyUpstream {
		/// Name of the unhealthy upstream service.
		upstream: &'static str,
	},
}

/// Configuration and validation failures raised by the service.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No PEM certificate blocks were found where at least one was required.
	#[error("No certificates found in the provided PEM bundle.")]
	NoCertificatesFound,
	/// A PEM bundle could not be parsed.
	#[error("Certificate bundle could not be parsed.")]
	InvalidCertificate {
		/// Underlying PEM parsing failure.
		#[source]
		source: pem::PemError,
	},
	/// The signing key is not an RSA key, or is otherwise unusable for RS256 signing.
	#[error("Signing key is not a usable RS256 private key.")]
	UnsupportedSigningKey {
		/// Underlying key-parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Signing the client-assertion JWT failed.
	#[error("Failed to sign the client-assertion JWT.")]
	JwtSigning {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// A cached token is missing a refresh token when a refresh was attempted.
	#[error("Cached token is missing a refresh token.")]
	MissingRefreshToken,
	/// A URA number failed validation.
	#[error("URA number `{value}` is invalid: {reason}.")]
	InvalidUraNumber {
		/// Offending raw value.
		value: String,
		/// Reason the value was rejected.
		reason: &'static str,
	},
	/// A BSN failed the elfproef checksum or length validation.
	#[error("BSN is invalid: {reason}.")]
	InvalidBsn {
		/// Reason the value was rejected.
		reason: &'static str,
	},
	/// A data domain identifier was empty or malformed.
	#[error("Data domain identifier is invalid: {reason}.")]
	InvalidDataDomain {
		/// Reason the value was rejected.
		reason: &'static str,
	},
	/// An endpoint URL configured for the service could not be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, TLS).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an upstream service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The upstream responded with a non-success status code.
	#[error("Upstream returned HTTP {status}: {body}")]
	Status {
		/// HTTP status code returned by the upstream.
		status: u16,
		/// Response body, truncated for diagnostics.
		body: String,
	},
	/// The response body could not be parsed as JSON.
	#[error("Upstream response could not be parsed as JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures specific to OAuth token acquisition.
#[derive(Debug, ThisError)]
pub enum TokenFetchError {
	/// The underlying transport call failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The token endpoint's response was missing required fields.
	#[error("Token endpoint response is missing required fields.")]
	MalformedResponse,
}

/// Failures from the pseudonym (OPRF) service client.
#[derive(Debug, ThisError)]
pub enum PseudonymError {
	/// The underlying transport call failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The pseudonym service rejected the request.
	#[error("Pseudonym service rejected the request: {reason}.")]
	Rejected {
		/// Reason reported by the pseudonym service.
		reason: String,
	},
	/// Local OPRF blinding failed.
	#[error("Failed to blind the personal identifier: {reason}.")]
	Blinding {
		/// Reason the blinding operation failed.
		reason: &'static str,
	},
}

/// Failures from the NVI (national referral index) client.
#[derive(Debug, ThisError)]
pub enum NviError {
	/// The underlying transport call failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// NVI returned an OperationOutcome describing why the request failed.
	#[error("NVI rejected the request: {diagnostics}.")]
	OperationOutcome {
		/// Diagnostics text from the first `issue` entry.
		diagnostics: String,
		/// HTTP status code returned alongside the outcome.
		status: u16,
	},
}

/// Failures from the metadata-source FHIR client.
#[derive(Debug, ThisError)]
pub enum MetadataError {
	/// The underlying transport call failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The FHIR bundle could not be parsed into the expected shape.
	#[error("Metadata bundle is malformed: {reason}.")]
	MalformedBundle {
		/// Reason the bundle failed to parse.
		reason: String,
	},
	/// The resource type is not one this deployment knows how to map.
	#[error("Resource type `{resource_type}` has no known patient reference field.")]
	UnsupportedResourceType {
		/// The unsupported FHIR resource type.
		resource_type: String,
	},
}
