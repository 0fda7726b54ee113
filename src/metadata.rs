//! Metadata-source client: FHIR search with `_lastUpdated` / `_include=subject`.

// self
use crate::{
	_prelude::*,
	error::MetadataError,
	fhir::{self, Bundle},
	http::HttpTransport,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
};

/// Queries the clinical metadata source for patient-linked resource updates.
///
/// Unlike NVI and the pseudonym service, the metadata source is not OAuth-protected in this
/// deployment; mTLS alone authenticates the client.
pub struct MetadataSourceClient {
	endpoint: Url,
	transport: HttpTransport,
}
impl MetadataSourceClient {
	/// Builds a client pointed at the given metadata-source base endpoint.
	pub fn new(endpoint: Url, transport: HttpTransport) -> Self {
		Self { endpoint, transport }
	}

	/// Fetches the raw search bundle for a resource type, optionally scoped to updates at or
	/// after `last_updated`.
	pub async fn get_resource_bundle(&self, resource_type: &str, last_updated: Option<&str>) -> Result<Bundle, MetadataError> {
		let url = self.endpoint.join(&format!("{resource_type}/_search")).map_err(|_| {
			MetadataError::MalformedBundle { reason: format!("could not build search URL for `{resource_type}`") }
		})?;
		let mut query = vec![("_include", format!("{resource_type}:subject"))];

		if let Some(last_updated) = last_updated {
			query.push(("_lastUpdated", format!("ge{last_updated}")));
		}

		Ok(self.transport.get_json(url, &query).await?)
	}

	/// Returns every BSN found on a Patient entry in the bundle, plus the maximum
	/// `meta.lastUpdated` across *all* entries (not only patients).
	///
	/// BSNs are not deduplicated; callers that require uniqueness must do so themselves.
	pub async fn get_update_scheme(
		&self,
		resource_type: &str,
		last_updated: Option<&str>,
	) -> Result<(Vec<String>, Option<String>), MetadataError> {
		let span = FlowSpan::new(FlowKind::Metadata, "get_update_scheme");

		record_flow_outcome(FlowKind::Metadata, FlowOutcome::Attempt);

		let outcome = span.instrument(self.get_update_scheme_inner(resource_type, last_updated)).await;

		record_flow_outcome(
			FlowKind::Metadata,
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		outcome
	}

	async fn get_update_scheme_inner(
		&self,
		resource_type: &str,
		last_updated: Option<&str>,
	) -> Result<(Vec<String>, Option<String>), MetadataError> {
		let bundle = self.get_resource_bundle(resource_type, last_updated).await?;
		let latest = fhir::latest_timestamp(&bundle)?;

		if bundle.entry.is_empty() {
			return Ok((Vec::new(), latest));
		}

		let bsns =
			fhir::patients(&bundle).into_iter().flat_map(fhir::bsn_identifiers).collect();

		Ok((bsns, latest))
	}

	/// Reports whether the metadata source's health endpoint returns a 2xx status.
	pub async fn server_healthy(&self) -> bool {
		let url = self.endpoint.join("metadata").unwrap_or_else(|_| self.endpoint.clone());

		self.transport.get_json::<serde_json::Value>(url, &[]).await.is_ok()
	}
}
