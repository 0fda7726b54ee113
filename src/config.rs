//! Typed configuration value objects for every option group this service recognizes.
//!
//! These types only describe shape and validation; reading them from a file or the
//! environment is a deployment concern this crate does not own.

// self
use crate::{
	_prelude::*,
	auth::CertificateKind,
	domain::{DataDomain, UraNumber},
	fhir::NviFhirSystems,
};

/// Logging verbosity, mirrored 1:1 onto `tracing`'s level filter by the embedding binary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	/// Verbose diagnostic output.
	Debug,
	#[default]
	/// Normal operational output.
	Info,
	/// Recoverable but noteworthy conditions.
	Warning,
	/// Failed operations.
	Error,
	/// Failures that should page someone.
	Critical,
}

/// The `app` option group: deployment identity and the domains it synchronizes.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
	/// Logging verbosity.
	#[serde(default)]
	pub loglevel: LogLevel,
	/// This deployment's own URA number.
	pub provider_id: UraNumber,
	/// Data domains this deployment is allowed to synchronize and register referrals for.
	#[serde(default, deserialize_with = "deserialize_csv_domains")]
	pub data_domains: Vec<DataDomain>,
	/// Organization type code stamped on every referral this deployment submits.
	pub default_organization_type: String,
}

fn deserialize_csv_domains<'de, D>(deserializer: D) -> std::result::Result<Vec<DataDomain>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

	if compact.is_empty() {
		return Ok(Vec::new());
	}

	compact.split(',').map(|s| DataDomain::new(s).map_err(serde::de::Error::custom)).collect()
}

/// The `scheduler` option group.
#[derive(Clone, Debug, Deserialize)]
pub struct SchedulerConfig {
	/// Gap, in seconds, between the end of one tick and the start of the next.
	#[serde(default = "SchedulerConfig::default_scheduled_delay")]
	pub scheduled_delay: u64,
	/// Whether the scheduler should be started automatically at boot.
	#[serde(default = "SchedulerConfig::default_automatic_background_update")]
	pub automatic_background_update: bool,
}
impl SchedulerConfig {
	/// The configured delay as a [`Duration`].
	pub fn delay(&self) -> Duration {
		Duration::seconds(self.scheduled_delay as i64)
	}

	fn default_scheduled_delay() -> u64 {
		5
	}

	fn default_automatic_background_update() -> bool {
		true
	}
}

/// How an upstream's server certificate should be verified.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum CaVerification {
	/// `true` verifies against the platform trust store; `false` disables verification.
	PlatformTrustStore(bool),
	/// Verify against this PEM-encoded CA bundle instead of the platform trust store.
	CustomBundle(String),
}
impl Default for CaVerification {
	fn default() -> Self {
		Self::PlatformTrustStore(true)
	}
}

/// Shared shape of every southbound upstream's connection options (pseudonym service, NVI,
/// metadata source, OAuth token endpoint).
#[derive(Clone, Debug, Deserialize)]
pub struct UpstreamApiConfig {
	/// When `true`, the client answers calls locally instead of making network requests.
	#[serde(default)]
	pub mock: bool,
	/// Base URL of the upstream.
	pub endpoint: Url,
	/// Per-request timeout, in seconds.
	#[serde(default = "UpstreamApiConfig::default_timeout")]
	pub timeout: u64,
	/// PEM-encoded mTLS client certificate (and optional chain).
	#[serde(default)]
	pub mtls_cert: Option<String>,
	/// PEM-encoded mTLS client private key.
	#[serde(default)]
	pub mtls_key: Option<String>,
	/// Server-certificate verification policy.
	#[serde(default)]
	pub verify_ca: CaVerification,
}
impl UpstreamApiConfig {
	/// The configured timeout as a [`Duration`].
	pub fn timeout_duration(&self) -> Duration {
		Duration::seconds(self.timeout as i64)
	}

	/// The custom CA bundle to trust, if [`CaVerification::CustomBundle`] was configured.
	pub fn custom_ca_cert_pem(&self) -> Option<&str> {
		match &self.verify_ca {
			CaVerification::CustomBundle(pem) => Some(pem.as_str()),
			CaVerification::PlatformTrustStore(_) => None,
		}
	}

	fn default_timeout() -> u64 {
		30
	}
}

/// The `oauth_api` option group: the shared upstream shape plus client-assertion options.
#[derive(Clone, Debug, Deserialize)]
pub struct OauthApiConfig {
	/// Connection options shared with every other upstream.
	#[serde(flatten)]
	pub api: UpstreamApiConfig,
	/// Whether the UZI/LDN distinction was already resolved to an LDN certificate requiring
	/// a signed client assertion.
	pub certificate_kind: CertificateKind,
	/// Whether to embed the signing certificate chain in the client-assertion JWT header.
	#[serde(default)]
	pub include_x5c: bool,
	/// PEM-encoded certificate (and optional chain) used to sign the client assertion, when
	/// `certificate_kind` is [`CertificateKind::Ldn`].
	#[serde(default)]
	pub signing_cert: Option<String>,
	/// PEM-encoded private key matching `signing_cert`.
	#[serde(default)]
	pub signing_key: Option<String>,
}

/// The `nvi_fhir_systems` option group, deserialized straight into [`NviFhirSystems`].
pub type NviFhirSystemsConfig = NviFhirSystems;

/// All recognized configuration option groups, aggregated into one value.
///
/// Hosting concerns (`uvicorn`: host/port/TLS paths) are intentionally absent — they belong
/// to whatever process embeds this crate, not to the service itself.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	/// Deployment identity and synchronized domains.
	pub app: AppConfig,
	/// Background synchronization cadence.
	pub scheduler: SchedulerConfig,
	/// Pseudonym service connection options.
	pub pseudonym_api: UpstreamApiConfig,
	/// NVI connection options.
	pub referral_api: UpstreamApiConfig,
	/// Metadata source connection options.
	pub metadata_api: UpstreamApiConfig,
	/// OAuth token endpoint connection and client-assertion options.
	pub oauth_api: OauthApiConfig,
	/// FHIR system URIs used when mapping referrals to NVI's wire shape.
	pub nvi_fhir_systems: NviFhirSystemsConfig,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn csv_domains_split_and_trim_whitespace() {
		let config: AppConfig = serde_json::from_value(serde_json::json!({
			"provider_id": "1234",
			"data_domains": " ImagingStudy, Observation ,Procedure",
			"default_organization_type": "hospital",
		}))
		.expect("fixture config should parse");

		assert_eq!(
			config.data_domains.iter().map(ToString::to_string).collect::<Vec<_>>(),
			vec!["ImagingStudy".to_owned(), "Observation".to_owned(), "Procedure".to_owned()]
		);
	}

	#[test]
	fn empty_csv_domains_is_an_empty_set() {
		let config: AppConfig = serde_json::from_value(serde_json::json!({
			"provider_id": "1234",
			"data_domains": "",
			"default_organization_type": "hospital",
		}))
		.expect("fixture config should parse");

		assert!(config.data_domains.is_empty());
	}

	#[test]
	fn scheduler_defaults_match_the_documented_cadence() {
		let config: SchedulerConfig = serde_json::from_value(serde_json::json!({})).expect("defaults should apply");

		assert_eq!(config.scheduled_delay, 5);
		assert!(config.automatic_background_update);
	}

	#[test]
	fn upstream_timeout_defaults_to_thirty_seconds() {
		let config: UpstreamApiConfig =
			serde_json::from_value(serde_json::json!({"endpoint": "https://example.test"}))
				.expect("defaults should apply");

		assert_eq!(config.timeout, 30);
		assert!(matches!(config.verify_ca, CaVerification::PlatformTrustStore(true)));
	}
}
