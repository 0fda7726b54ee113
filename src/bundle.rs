//! Bundle registration: validates a submitted batch of clinical resources and emits a
//! per-entry outcome bundle.

// self
use crate::{
	_prelude::*,
	domain::{Bsn, DataDomain},
	error::Error,
	fhir::{self, Bundle, BundleEntryResponse, ResponseBundle},
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
	registration::ReferralRegistrationService,
};

/// Validates and registers every non-Patient resource in a submitted bundle.
pub struct BundleRegistrationService {
	registration: Arc<ReferralRegistrationService>,
}
impl BundleRegistrationService {
	/// Builds the service from the registration pipeline it drives.
	pub fn new(registration: Arc<ReferralRegistrationService>) -> Self {
		Self { registration }
	}

	/// Processes every non-Patient resource in `bundle`, returning one outcome per such
	/// resource (Patient entries produce none), in emission order.
	///
	/// Fails the whole request with [`Error::InvalidResource`] if the bundle has no entries
	/// at all. A registration failure on one entry (OPRF, pseudonym service, or NVI) aborts
	/// the whole request rather than being folded into a per-entry outcome, matching how
	/// manually triggered flows surface errors.
	pub async fn register(&self, bundle: &Bundle) -> Result<ResponseBundle> {
		let span = FlowSpan::new(FlowKind::Bundle, "register");

		record_flow_outcome(FlowKind::Bundle, FlowOutcome::Attempt);

		let outcome = span.instrument(self.register_inner(bundle)).await;

		record_flow_outcome(FlowKind::Bundle, if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure });

		outcome
	}

	async fn register_inner(&self, bundle: &Bundle) -> Result<ResponseBundle> {
		if bundle.entry.is_empty() {
			return Err(Error::InvalidResource { reason: "bundle has no entries".to_owned() });
		}

		let (order, resources) = index_by_id(bundle);
		let mut responses = Vec::with_capacity(order.len());

		for id in &order {
			let resource = &resources[id];

			if fhir::resource_type(resource) == Some("Patient") {
				continue;
			}

			responses.push(self.register_entry(id, resource, &resources).await?);
		}

		Ok(ResponseBundle::from_entry_responses(responses))
	}

	async fn register_entry(
		&self,
		id: &str,
		resource: &serde_json::Value,
		resources: &HashMap<String, serde_json::Value>,
	) -> Result<BundleEntryResponse> {
		let Some(reference) = fhir::patient_reference(resource) else {
			return Ok(fhir::bundle_entry_response(400, "error", "invalid", format!("no reference for patient found for {id}")));
		};

		let Some((ref_type, ref_id)) = fhir::reference_type_and_id(reference) else {
			let resource_type = fhir::resource_type(resource).unwrap_or("unknown");

			return Ok(fhir::bundle_entry_response(
				400,
				"error",
				"invalid",
				format!("reference for '{resource_type}: {id}' is not relative, only relative references are allowed"),
			));
		};

		if ref_type != "Patient" {
			return Ok(fhir::bundle_entry_response(400, "error", "invalid", "reference is not a valid Patient reference"));
		}

		let Some(patient) = resources.get(ref_id) else {
			return Ok(fhir::bundle_entry_response(
				400,
				"error",
				"invalid",
				"Patient associated with resource does not exist in Bundle",
			));
		};

		if fhir::resource_type(patient) != Some("Patient") {
			return Ok(fhir::bundle_entry_response(400, "error", "invalid", "Patient is not a valid Resource"));
		}

		if patient.get("identifier").is_none() {
			return Ok(fhir::bundle_entry_response(400, "error", "invalid", "Patient without identifiers"));
		}

		let bsn_candidates = fhir::bsn_identifiers(patient);

		let [bsn_raw] = bsn_candidates.as_slice() else {
			return Ok(fhir::bundle_entry_response(
				400,
				"error",
				"invalid",
				"Only one identifier with BSN system is allowed",
			));
		};

		let bsn = match Bsn::new(bsn_raw) {
			Ok(bsn) => bsn,
			Err(_) => return Ok(fhir::bundle_entry_response(400, "error", "invalid", "Invalid BSN number")),
		};

		let resource_type = fhir::resource_type(resource).unwrap_or("unknown");
		let data_domain = DataDomain::new(resource_type)?;
		let referral = self.registration.register(&bsn, &data_domain).await?;

		Ok(match referral {
			None => fhir::bundle_entry_response(400, "warning", "duplicate", "Record already exists"),
			Some(_) => fhir::bundle_entry_response(201, "information", "created", "Record created successfully"),
		})
	}
}

/// Builds an `id -> resource` map from all entries carrying a resource with an `id`,
/// returning the ids in first-seen order (later entries with the same id overwrite the
/// earlier value but keep its original position, matching a dict's update semantics).
fn index_by_id(bundle: &Bundle) -> (Vec<String>, HashMap<String, serde_json::Value>) {
	let mut order = Vec::new();
	let mut resources = HashMap::new();

	for entry in &bundle.entry {
		let Some(resource) = &entry.resource else { continue };
		let Some(id) = fhir::resource_id(resource) else { continue };

		if !resources.contains_key(id) {
			order.push(id.to_owned());
		}

		resources.insert(id.to_owned(), resource.clone());
	}

	(order, resources)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn index_by_id_preserves_first_seen_order() {
		let bundle: Bundle = serde_json::from_value(serde_json::json!({
			"entry": [
				{"resource": {"resourceType": "Patient", "id": "p1"}},
				{"resource": {"resourceType": "ImagingStudy", "id": "i1"}},
			],
		}))
		.expect("fixture bundle should parse");

		let (order, resources) = index_by_id(&bundle);

		assert_eq!(order, vec!["p1".to_owned(), "i1".to_owned()]);
		assert_eq!(resources.len(), 2);
	}
}
