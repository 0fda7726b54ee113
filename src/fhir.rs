//! FHIR wire shapes shared by the NVI, metadata-source, and bundle-registration paths.
//!
//! This service consumes FHIR resources via their documented field paths only; it does not
//! own a general-purpose FHIR resource model. Resources are carried as [`serde_json::Value`]
//! and picked apart by the few fields each operation actually needs.

// crates.io
use serde_json::Value;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	domain::{CreateReferralRequest, DataDomain, ReferralEntity, UraNumber},
	error::{MetadataError, NviError},
};

/// Canonical BSN identifier system URI used by the metadata source and submitted bundles.
pub const BSN_SYSTEM: &str = "http://fhir.nl/fhir/NamingSystem/bsn";

/// A FHIR searchset or transaction-response bundle, reduced to the fields this service reads.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Bundle {
	/// Bundle entries, in server order.
	#[serde(default)]
	pub entry: Vec<BundleEntry>,
}

/// A single bundle entry, reduced to its resource.
#[derive(Clone, Debug, Deserialize)]
pub struct BundleEntry {
	/// The FHIR resource carried by this entry, if any.
	#[serde(default)]
	pub resource: Option<Value>,
}

/// The 23 resource types whose patient reference lives in a `subject` field rather than
/// `patient`, as mapped by this deployment's bundle-registration and metadata paths.
const SUBJECT_REFERENCED_TYPES: &[&str] = &[
	"ImagingStudy",
	"CarePlan",
	"CareTeam",
	"ClinicalImpression",
	"Encounter",
	"DiagnosticReport",
	"MedicationStatement",
	"MedicationAdministration",
	"MedicationDispense",
	"MedicationRequest",
	"MeasureReport",
	"Observation",
	"Procedure",
	"RiskAssessment",
];

/// Resource types whose patient reference lives in a `patient` field.
const PATIENT_REFERENCED_TYPES: &[&str] = &[
	"AllergyIntolerance",
	"BodyStructure",
	"DetectedIssue",
	"FamilyMemberHistory",
	"Immunization",
	"ImmunizationEvaluation",
	"ImmunizationRecommendation",
	"MolecularSequence",
	"NutritionOrder",
];

/// Returns the field name (`"subject"` or `"patient"`) this resource type's patient
/// reference is stored under, or `None` for resource types this deployment does not map.
pub fn patient_reference_field(resource_type: &str) -> Option<&'static str> {
	if SUBJECT_REFERENCED_TYPES.contains(&resource_type) {
		Some("subject")
	} else if PATIENT_REFERENCED_TYPES.contains(&resource_type) {
		Some("patient")
	} else {
		None
	}
}

/// Reads a resource's `resourceType` field.
pub fn resource_type(resource: &Value) -> Option<&str> {
	resource.get("resourceType").and_then(Value::as_str)
}

/// Reads a resource's `id` field.
pub fn resource_id(resource: &Value) -> Option<&str> {
	resource.get("id").and_then(Value::as_str)
}

/// Reads a resource's patient/subject reference string (the `reference` field of the
/// reference object named by [`patient_reference_field`]), if the resource type is known
/// and the field is populated.
pub fn patient_reference(resource: &Value) -> Option<&str> {
	let field = patient_reference_field(resource_type(resource)?)?;

	resource.get(field)?.get("reference")?.as_str()
}

/// Splits a relative FHIR reference (`"Patient/abc-123"`) into `(type, id)`. Contained
/// references (`"#abc"`) and any reference without a `/` are rejected.
pub fn reference_type_and_id(reference: &str) -> Option<(&str, &str)> {
	let (ref_type, ref_id) = reference.split_once('/')?;

	if ref_type.is_empty() || ref_id.is_empty() {
		return None;
	}

	Some((ref_type, ref_id))
}

/// Collects every `identifier.value` whose `identifier.system` equals [`BSN_SYSTEM`].
pub fn bsn_identifiers(resource: &Value) -> Vec<String> {
	resource
		.get("identifier")
		.and_then(Value::as_array)
		.map(|identifiers| {
			identifiers
				.iter()
				.filter(|id| id.get("system").and_then(Value::as_str) == Some(BSN_SYSTEM))
				.filter_map(|id| id.get("value").and_then(Value::as_str))
				.map(str::to_owned)
				.collect()
		})
		.unwrap_or_default()
}

/// The maximum `meta.lastUpdated` instant across every entry in the bundle, Patient or not.
/// `None` if the bundle has no entries or none carry a timestamp.
pub fn latest_timestamp(bundle: &Bundle) -> Result<Option<String>, MetadataError> {
	let mut latest: Option<OffsetDateTime> = None;

	for entry in &bundle.entry {
		let Some(resource) = &entry.resource else { continue };
		let Some(raw) = resource.get("meta").and_then(|m| m.get("lastUpdated")).and_then(Value::as_str) else {
			continue;
		};
		let parsed = OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
			.map_err(|_| MetadataError::MalformedBundle { reason: format!("unparseable lastUpdated `{raw}`") })?;

		latest = Some(latest.map_or(parsed, |current| current.max(parsed)));
	}

	Ok(latest
		.map(|instant| instant.format(&time::format_description::well_known::Rfc3339))
		.transpose()
		.map_err(|_| MetadataError::MalformedBundle { reason: "failed to format latest timestamp".to_owned() })?)
}

/// Every entry whose `resourceType` is `Patient`.
pub fn patients(bundle: &Bundle) -> Vec<&Value> {
	bundle
		.entry
		.iter()
		.filter_map(|entry| entry.resource.as_ref())
		.filter(|resource| resource_type(resource) == Some("Patient"))
		.collect()
}

/// The four deployment-configured FHIR system URIs used by NVI's `NVIDataReference` mapping.
#[derive(Clone, Debug, Deserialize)]
pub struct NviFhirSystems {
	/// `subject.system` on the NVI resource, identifying the pseudonym namespace.
	pub pseudonym_system: String,
	/// `source.system`, identifying the organization-identifier namespace.
	pub source_system: String,
	/// `sourceType.coding[0].system`, identifying the organization-type code system.
	pub organization_type_system: String,
	/// `careContext.coding[0].system`, identifying the care-context code system.
	pub care_context_system: String,
}

/// Maps a [`CreateReferralRequest`] to the FHIR `NVIDataReference` body NVI expects.
pub fn create_referral_request_to_fhir(request: &CreateReferralRequest, systems: &NviFhirSystems) -> Value {
	serde_json::json!({
		"resourceType": "NVIDataReference",
		"subject": {
			"system": systems.pseudonym_system,
			"value": request.oprf_jwe.jwe,
		},
		"source": {
			"system": systems.source_system,
			"value": request.ura_number.to_string(),
		},
		"sourceType": {
			"coding": [{
				"system": systems.organization_type_system,
				"code": request.organization_type,
				"display": capitalize(&request.organization_type),
			}],
		},
		"careContext": {
			"coding": [{
				"system": systems.care_context_system,
				"code": request.data_domain.to_string(),
			}],
		},
		"oprfKey": request.blind_factor,
	})
}

fn capitalize(s: &str) -> String {
	let mut chars = s.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
		None => String::new(),
	}
}

/// Parses NVI's FHIR `NVIDataReference` response body into a [`ReferralEntity`].
pub fn parse_referral_entity(body: &Value) -> Result<ReferralEntity, NviError> {
	let malformed = || NviError::OperationOutcome {
		diagnostics: "NVIDataReference response is missing required fields".to_owned(),
		status: 200,
	};
	let id = body.get("id").and_then(Value::as_str).ok_or_else(malformed)?;
	let id = Uuid::parse_str(id).map_err(|_| malformed())?;
	let ura_number = body.get("source").and_then(|s| s.get("value")).and_then(Value::as_str).ok_or_else(malformed)?;
	let ura_number = UraNumber::new(ura_number).map_err(|_| malformed())?;
	let data_domain = body
		.get("careContext")
		.and_then(|c| c.get("coding"))
		.and_then(Value::as_array)
		.and_then(|codings| codings.first())
		.and_then(|c| c.get("code"))
		.and_then(Value::as_str)
		.ok_or_else(malformed)?;
	let data_domain = DataDomain::new(data_domain).map_err(|_| malformed())?;
	let organization_type = body
		.get("sourceType")
		.and_then(|c| c.get("coding"))
		.and_then(Value::as_array)
		.and_then(|codings| codings.first())
		.and_then(|c| c.get("code"))
		.and_then(Value::as_str)
		.ok_or_else(malformed)?
		.to_owned();

	Ok(ReferralEntity { id, ura_number, data_domain, organization_type })
}

/// `{ resourceType: "OperationOutcome", issue: [...] }`, the error-body shape carried by
/// every northbound failure response and every per-entry bundle outcome.
#[derive(Clone, Debug, Serialize)]
pub struct OperationOutcome {
	/// Always `"OperationOutcome"`.
	#[serde(rename = "resourceType")]
	pub resource_type: &'static str,
	/// The (usually single) issue describing the failure.
	pub issue: Vec<OperationOutcomeIssue>,
}

/// One FHIR `OperationOutcome.issue` entry.
#[derive(Clone, Debug, Serialize)]
pub struct OperationOutcomeIssue {
	/// `"error"`, `"warning"`, or `"information"`.
	pub severity: &'static str,
	/// A short FHIR issue-type code, e.g. `"invalid"`, `"duplicate"`, `"exception"`.
	pub code: &'static str,
	/// Human-readable detail.
	pub details: OperationOutcomeDetails,
}

/// The `details.text` wrapper FHIR uses for issue descriptions.
#[derive(Clone, Debug, Serialize)]
pub struct OperationOutcomeDetails {
	/// The detail text itself.
	pub text: String,
}

impl OperationOutcome {
	/// Builds a single-issue outcome.
	pub fn single(severity: &'static str, code: &'static str, details: impl Into<String>) -> Self {
		Self {
			resource_type: "OperationOutcome",
			issue: vec![OperationOutcomeIssue {
				severity,
				code,
				details: OperationOutcomeDetails { text: details.into() },
			}],
		}
	}
}

/// One entry of a `transaction-response` bundle built from per-resource registration outcomes.
#[derive(Clone, Debug, Serialize)]
pub struct BundleEntryResponse {
	/// HTTP status of this entry, as a string (FHIR convention).
	pub status: String,
	/// The outcome describing why this status was returned.
	pub outcome: OperationOutcome,
}

/// Builds a single bundle-entry response, mirroring the outcome shapes bundle registration
/// emits for created / duplicate / invalid entries.
pub fn bundle_entry_response(status: u16, severity: &'static str, code: &'static str, details: impl Into<String>) -> BundleEntryResponse {
	BundleEntryResponse { status: status.to_string(), outcome: OperationOutcome::single(severity, code, details) }
}

/// A `transaction-response` bundle assembled from per-entry outcomes, in emission order.
#[derive(Clone, Debug, Serialize)]
pub struct ResponseBundle {
	#[serde(rename = "type")]
	bundle_type: &'static str,
	entry: Vec<BundleResponseEntry>,
}

/// A bundle entry carrying only a `response`, as produced by transaction-response bundles.
#[derive(Clone, Debug, Serialize)]
struct BundleResponseEntry {
	response: BundleEntryResponse,
}

impl ResponseBundle {
	/// Wraps per-entry responses into a `transaction-response` bundle.
	pub fn from_entry_responses(responses: Vec<BundleEntryResponse>) -> Self {
		Self {
			bundle_type: "transaction-response",
			entry: responses.into_iter().map(|response| BundleResponseEntry { response }).collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn patient_reference_field_matches_known_tables() {
		assert_eq!(patient_reference_field("ImagingStudy"), Some("subject"));
		assert_eq!(patient_reference_field("Immunization"), Some("patient"));
		assert_eq!(patient_reference_field("Binary"), None);
	}

	#[test]
	fn reference_type_and_id_rejects_contained_references() {
		assert_eq!(reference_type_and_id("Patient/abc-123"), Some(("Patient", "abc-123")));
		assert_eq!(reference_type_and_id("#abc-123"), None);
		assert_eq!(reference_type_and_id("abc-123"), None);
	}

	#[test]
	fn bsn_identifiers_filters_by_system() {
		let resource = serde_json::json!({
			"resourceType": "Patient",
			"identifier": [
				{"system": BSN_SYSTEM, "value": "200060429"},
				{"system": "urn:other", "value": "ignored"},
			],
		});

		assert_eq!(bsn_identifiers(&resource), vec!["200060429".to_owned()]);
	}

	#[test]
	fn latest_timestamp_takes_the_max_across_all_entries() {
		let bundle: Bundle = serde_json::from_value(serde_json::json!({
			"entry": [
				{"resource": {"resourceType": "Patient", "meta": {"lastUpdated": "2025-12-01T00:00:00Z"}}},
				{"resource": {"resourceType": "ImagingStudy", "meta": {"lastUpdated": "2025-12-10T12:00:00Z"}}},
			],
		}))
		.expect("fixture bundle should parse");

		assert_eq!(latest_timestamp(&bundle).unwrap().as_deref(), Some("2025-12-10T12:00:00Z"));
	}

	#[test]
	fn latest_timestamp_is_none_for_empty_bundle() {
		let bundle = Bundle::default();

		assert_eq!(latest_timestamp(&bundle).unwrap(), None);
	}

	#[test]
	fn create_referral_request_to_fhir_maps_fields() {
		let request = CreateReferralRequest {
			oprf_jwe: crate::domain::OprfPseudonymJwe { jwe: "some_pseudonym".to_owned() },
			blind_factor: "blind-factor".to_owned(),
			ura_number: UraNumber::new("1234").unwrap(),
			organization_type: "hospital".to_owned(),
			data_domain: DataDomain::new("ImagingStudy").unwrap(),
		};
		let systems = NviFhirSystems {
			pseudonym_system: "urn:pseudonym".to_owned(),
			source_system: "urn:source".to_owned(),
			organization_type_system: "urn:org-type".to_owned(),
			care_context_system: "urn:care-context".to_owned(),
		};
		let fhir = create_referral_request_to_fhir(&request, &systems);

		assert_eq!(fhir["subject"]["value"], "some_pseudonym");
		assert_eq!(fhir["source"]["value"], "00001234");
		assert_eq!(fhir["sourceType"]["coding"][0]["display"], "Hospital");
		assert_eq!(fhir["careContext"]["coding"][0]["code"], "ImagingStudy");
		assert_eq!(fhir["oprfKey"], "blind-factor");
	}

	#[test]
	fn parse_referral_entity_reads_fhir_shape() {
		let body = serde_json::json!({
			"id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
			"source": {"value": "00001234"},
			"sourceType": {"coding": [{"code": "hospital"}]},
			"careContext": {"coding": [{"code": "ImagingStudy"}]},
		});
		let entity = parse_referral_entity(&body).expect("fixture should parse");

		assert_eq!(entity.ura_number.to_string(), "00001234");
		assert_eq!(entity.data_domain.to_string(), "ImagingStudy");
		assert_eq!(entity.organization_type, "hospital");
	}
}
