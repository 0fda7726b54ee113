//! Pseudonym service client: remote OPRF evaluation and the legacy BSN-hash register flow.

// self
use crate::{
	_prelude::*,
	auth::OAuthTokenService,
	domain::{Bsn, OprfPseudonymJwe, Pseudonym, PseudonymRequest},
	error::PseudonymError,
	http::HttpTransport,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
};

const SCOPE_READ: &str = "prs:read";

/// Configuration governing the pseudonym service client, including whether the
/// deployment-specific legacy BSN-hash flow is enabled.
#[derive(Clone, Debug)]
pub struct PseudonymApiConfig {
	/// This deployment's own URA number, used as the legacy flow's provider id.
	pub provider_id: String,
	/// Whether [`PseudonymServiceClient::register_legacy`] may be called. Defaults to
	/// `false`: the OPRF-JWE flow is the specified path, and the legacy flow should only be
	/// enabled when a deployment's pseudonym service does not yet support OPRF.
	pub legacy_register_enabled: bool,
}
impl Default for PseudonymApiConfig {
	fn default() -> Self {
		Self { provider_id: String::new(), legacy_register_enabled: false }
	}
}

/// Talks to the pseudonym (OPRF evaluation) service.
pub struct PseudonymServiceClient {
	endpoint: Url,
	transport: HttpTransport,
	oauth: Arc<OAuthTokenService>,
	config: PseudonymApiConfig,
}
impl PseudonymServiceClient {
	/// Builds a client pointed at the given pseudonym service endpoint.
	pub fn new(endpoint: Url, transport: HttpTransport, oauth: Arc<OAuthTokenService>, config: PseudonymApiConfig) -> Self {
		Self { endpoint, transport, oauth, config }
	}

	/// Exchanges a blinded input for its OPRF-evaluated JWE pseudonym.
	pub async fn submit(&self, request: &PseudonymRequest) -> Result<OprfPseudonymJwe> {
		let span = FlowSpan::new(FlowKind::Pseudonymize, "submit");

		record_flow_outcome(FlowKind::Pseudonymize, FlowOutcome::Attempt);

		let outcome = span.instrument(self.submit_inner(request)).await;

		record_flow_outcome(
			FlowKind::Pseudonymize,
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		outcome
	}

	async fn submit_inner(&self, request: &PseudonymRequest) -> Result<OprfPseudonymJwe> {
		let token = self.oauth.fetch_token(SCOPE_READ, self.endpoint.as_str()).await?;
		let url = self.resource_url("oprf/eval");
		let response: serde_json::Value = self
			.transport
			.post_json_bearer(url, token.access_token.expose(), request)
			.await
			.map_err(PseudonymError::from)?;
		let jwe = response
			.get("jwe")
			.and_then(serde_json::Value::as_str)
			.filter(|jwe| !jwe.is_empty())
			.ok_or_else(|| PseudonymError::Rejected { reason: "response is missing a non-empty `jwe`".to_owned() })?;

		Ok(OprfPseudonymJwe { jwe: jwe.to_owned() })
	}

	/// Legacy provider-id + SHA-256(BSN) register flow, usable only where the deployed
	/// pseudonym service supports it and [`PseudonymApiConfig::legacy_register_enabled`] is
	/// set.
	pub async fn register_legacy(&self, bsn: &Bsn) -> Result<Pseudonym> {
		if !self.config.legacy_register_enabled {
			return Err(PseudonymError::Rejected { reason: "legacy register flow is disabled".to_owned() }.into());
		}

		let form =
			vec![("provider_id", self.config.provider_id.clone()), ("bsn_hash", bsn.hash())];
		let url = self.resource_url("register");
		let response: serde_json::Value =
			self.transport.post_form(url, &form).await.map_err(PseudonymError::from)?;
		let pseudonym = response
			.get("pseudonym")
			.and_then(serde_json::Value::as_str)
			.filter(|p| !p.is_empty())
			.ok_or_else(|| PseudonymError::Rejected { reason: "response is missing a non-empty `pseudonym`".to_owned() })?;

		Ok(Pseudonym { pseudonym: pseudonym.to_owned() })
	}

	/// Reports whether the pseudonym service's health endpoint returns a 2xx status.
	pub async fn server_healthy(&self) -> bool {
		let url = self.resource_url("health");

		self.transport.get_json::<serde_json::Value>(url, &[]).await.is_ok()
	}

	fn resource_url(&self, sub_route: &str) -> Url {
		self.endpoint.join(sub_route).unwrap_or_else(|_| self.endpoint.clone())
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	fn client(config: PseudonymApiConfig) -> PseudonymServiceClient {
		let endpoint = Url::parse("https://pseudonym.example/").unwrap();
		let transport = HttpTransport::with_client(ReqwestClient::new());
		let oauth = Arc::new(OAuthTokenService::new(endpoint.clone(), transport.clone(), None, true));

		PseudonymServiceClient::new(endpoint, transport, oauth, config)
	}

	#[tokio::test]
	async fn legacy_register_is_disabled_by_default() {
		let bsn = Bsn::new("111222333").unwrap();
		let err = client(PseudonymApiConfig::default()).register_legacy(&bsn).await.unwrap_err();

		assert!(matches!(err, Error::Pseudonym(PseudonymError::Rejected { .. })));
	}
}
