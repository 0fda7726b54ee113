//! Bundle-registration scope and validation scenarios.

// crates.io
use httpmock::prelude::*;
// self
use referral_registration_service::{
	_preludet::*,
	auth::OAuthTokenService,
	bundle::BundleRegistrationService,
	domain::UraNumber,
	fhir::NviFhirSystems,
	nvi::NviClient,
	pseudonym::{PseudonymApiConfig, PseudonymServiceClient},
	registration::{RegistrationDefaults, ReferralRegistrationService},
};

fn service(server: &MockServer) -> BundleRegistrationService {
	let endpoint = Url::parse(&server.base_url()).expect("Mock server base URL should parse.");
	let transport = test_reqwest_http_client();
	let oauth = Arc::new(OAuthTokenService::new(endpoint.clone(), transport.clone(), None, true));
	let ura_number = UraNumber::new("1234").expect("URA fixture should be valid.");
	let systems = NviFhirSystems {
		pseudonym_system: "urn:pseudonym".to_owned(),
		source_system: "urn:source".to_owned(),
		organization_type_system: "urn:org-type".to_owned(),
		care_context_system: "urn:care-context".to_owned(),
	};

	let pseudonym_client = Arc::new(PseudonymServiceClient::new(
		endpoint.clone(),
		transport.clone(),
		Arc::clone(&oauth),
		PseudonymApiConfig::default(),
	));
	let nvi_client = Arc::new(NviClient::new(endpoint, transport, oauth, systems));
	let registration = Arc::new(ReferralRegistrationService::new(
		pseudonym_client,
		nvi_client,
		RegistrationDefaults { ura_number, default_organization_type: "hospital".to_owned() },
	));

	BundleRegistrationService::new(registration)
}

#[tokio::test]
async fn invalid_bsn_yields_a_single_error_outcome_and_never_touches_registration() {
	let server = MockServer::start_async().await;
	let submit = server
		.mock_async(|when, then| {
			when.method(POST).path("/oprf/eval");
			then.status(200).json_body(serde_json::json!({"jwe": "should-not-be-called"}));
		})
		.await;

	let bundle = serde_json::from_value(serde_json::json!({
		"entry": [
			{
				"resource": {
					"resourceType": "Patient",
					"id": "patient-1",
					"identifier": [{"system": "http://fhir.nl/fhir/NamingSystem/bsn", "value": "123456789"}],
				},
			},
			{
				"resource": {
					"resourceType": "ImagingStudy",
					"id": "study-1",
					"subject": {"reference": "Patient/patient-1"},
				},
			},
		],
	}))
	.expect("Fixture bundle should parse.");

	let response = service(&server).register(&bundle).await.expect("Validation failures are reported, not raised.");
	let json = serde_json::to_value(&response).expect("Response bundle should serialize.");
	let entries = json["entry"].as_array().expect("Response bundle should carry an entry array.");

	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0]["response"]["status"], "400");
	assert_eq!(entries[0]["response"]["outcome"]["issue"][0]["severity"], "error");
	assert_eq!(entries[0]["response"]["outcome"]["issue"][0]["details"]["text"], "Invalid BSN number");

	submit.assert_hits_async(0).await;
}

#[tokio::test]
async fn empty_bundle_is_rejected() {
	let server = MockServer::start_async().await;
	let bundle = serde_json::from_value(serde_json::json!({"entry": []})).expect("Fixture bundle should parse.");

	let err = service(&server).register(&bundle).await.expect_err("An empty bundle carries nothing to register.");

	assert!(matches!(err, referral_registration_service::error::Error::InvalidResource { .. }));
}

#[tokio::test]
async fn new_referral_yields_a_created_outcome() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oprf/eval");
			then.status(200).json_body(serde_json::json!({"jwe": "some_pseudonym"}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/NVIDataReference");
			then.status(200).json_body(serde_json::json!({"entry": []}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/NVIDataReference");
			then.status(200).json_body(serde_json::json!({
				"id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
				"source": {"system": "urn:source", "value": "00001234"},
				"sourceType": {"coding": [{"system": "urn:org-type", "code": "hospital"}]},
				"careContext": {"coding": [{"system": "urn:care-context", "code": "ImagingStudy"}]},
			}));
		})
		.await;

	let bundle = serde_json::from_value(serde_json::json!({
		"entry": [
			{
				"resource": {
					"resourceType": "Patient",
					"id": "patient-1",
					"identifier": [{"system": "http://fhir.nl/fhir/NamingSystem/bsn", "value": "200060429"}],
				},
			},
			{
				"resource": {
					"resourceType": "ImagingStudy",
					"id": "study-1",
					"subject": {"reference": "Patient/patient-1"},
				},
			},
		],
	}))
	.expect("Fixture bundle should parse.");

	let response = service(&server).register(&bundle).await.expect("A fresh referral should register cleanly.");
	let json = serde_json::to_value(&response).expect("Response bundle should serialize.");
	let entries = json["entry"].as_array().expect("Response bundle should carry an entry array.");

	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0]["response"]["status"], "201");
	assert_eq!(entries[0]["response"]["outcome"]["issue"][0]["severity"], "information");
	assert_eq!(entries[0]["response"]["outcome"]["issue"][0]["code"], "created");
}

#[tokio::test]
async fn patient_entries_never_produce_their_own_outcome() {
	let server = MockServer::start_async().await;
	let bundle = serde_json::from_value(serde_json::json!({
		"entry": [
			{
				"resource": {
					"resourceType": "Patient",
					"id": "patient-1",
					"identifier": [{"system": "http://fhir.nl/fhir/NamingSystem/bsn", "value": "123456789"}],
				},
			},
		],
	}))
	.expect("Fixture bundle should parse.");

	let response = service(&server).register(&bundle).await.expect("Validation failures are reported, not raised.");
	let json = serde_json::to_value(&response).expect("Response bundle should serialize.");
	let entries = json["entry"].as_array().expect("Response bundle should carry an entry array.");

	assert!(entries.is_empty(), "A bundle with only a Patient entry must yield zero outcomes.");
}
