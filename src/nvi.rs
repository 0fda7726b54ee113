//! NVI (national referral index) client: FHIR-style GET/POST over `NVIDataReference`.

// self
use crate::{
	_prelude::*,
	auth::OAuthTokenService,
	domain::{CreateReferralRequest, ReferralEntity, ReferralQuery},
	fhir::{self, NviFhirSystems},
	http::HttpTransport,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
};

const SCOPE_READ: &str = "epd:read";
const SCOPE_WRITE: &str = "epd:write";

/// Talks to the NVI FHIR endpoint on behalf of the registration pipeline.
pub struct NviClient {
	endpoint: Url,
	transport: HttpTransport,
	oauth: Arc<OAuthTokenService>,
	systems: NviFhirSystems,
}
impl NviClient {
	/// Builds a client pointed at the given NVI base endpoint.
	pub fn new(endpoint: Url, transport: HttpTransport, oauth: Arc<OAuthTokenService>, systems: NviFhirSystems) -> Self {
		Self { endpoint, transport, oauth, systems }
	}

	/// Returns `true` iff NVI already holds a referral matching this query.
	pub async fn is_referral_registered(&self, query: &ReferralQuery) -> Result<bool> {
		let span = FlowSpan::new(FlowKind::Nvi, "is_referral_registered");

		record_flow_outcome(FlowKind::Nvi, FlowOutcome::Attempt);

		let outcome = span.instrument(self.is_referral_registered_inner(query)).await;

		record_flow_outcome(FlowKind::Nvi, if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure });

		outcome
	}

	async fn is_referral_registered_inner(&self, query: &ReferralQuery) -> Result<bool> {
		let token = self.oauth.fetch_token(SCOPE_READ, self.endpoint.as_str()).await?;
		let url = self.resource_url("NVIDataReference");
		let bundle: fhir::Bundle =
			self.transport.get_json_bearer(url, token.access_token.expose(), &query.to_query_pairs()).await.map_err(
				crate::error::NviError::from,
			)?;

		Ok(!bundle.entry.is_empty())
	}

	/// Submits a new referral to NVI, returning the referral NVI created.
	pub async fn submit(&self, request: &CreateReferralRequest) -> Result<ReferralEntity> {
		let span = FlowSpan::new(FlowKind::Nvi, "submit");

		record_flow_outcome(FlowKind::Nvi, FlowOutcome::Attempt);

		let outcome = span.instrument(self.submit_inner(request)).await;

		record_flow_outcome(FlowKind::Nvi, if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure });

		outcome
	}

	async fn submit_inner(&self, request: &CreateReferralRequest) -> Result<ReferralEntity> {
		let token = self.oauth.fetch_token(SCOPE_WRITE, self.endpoint.as_str()).await?;
		let url = self.resource_url("NVIDataReference");
		let body = fhir::create_referral_request_to_fhir(request, &self.systems);
		let response: serde_json::Value = self
			.transport
			.post_json_bearer(url, token.access_token.expose(), &body)
			.await
			.map_err(crate::error::NviError::from)?;

		Ok(fhir::parse_referral_entity(&response)?)
	}

	/// Reports whether NVI's health endpoint returns a 2xx status.
	pub async fn server_healthy(&self) -> bool {
		let url = self.resource_url("health");

		self.transport.get_json::<serde_json::Value>(url, &[]).await.is_ok()
	}

	fn resource_url(&self, sub_route: &str) -> Url {
		self.endpoint.join(sub_route).unwrap_or_else(|_| self.endpoint.clone())
	}
}
