//! Regression coverage for a real (non-mock) OAuth grant feeding a bearer token onto a
//! write-path request.

// crates.io
use httpmock::prelude::*;
// self
use referral_registration_service::{
	_preludet::*,
	auth::OAuthTokenService,
	domain::PseudonymRequest,
	pseudonym::{PseudonymApiConfig, PseudonymServiceClient},
};

#[tokio::test]
async fn submit_attaches_a_bearer_token_obtained_via_client_credentials() {
	let server = MockServer::start_async().await;
	let endpoint = Url::parse(&server.base_url()).expect("Mock server base URL should parse.");
	let token_endpoint = endpoint.join("/token").expect("Token URL should join.");

	let token_grant = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_contains("grant_type=client_credentials");
			then.status(200).header("content-type", "application/json").json_body(serde_json::json!({
				"access_token": "live-access-token",
				"token_type": "Bearer",
				"scope": "prs:read",
				"expires_in": 600,
			}));
		})
		.await;
	let oprf_eval = server
		.mock_async(|when, then| {
			when.method(POST).path("/oprf/eval").header("authorization", "Bearer live-access-token");
			then.status(200).json_body(serde_json::json!({"jwe": "some_pseudonym"}));
		})
		.await;

	let transport = test_reqwest_http_client();
	let oauth = Arc::new(OAuthTokenService::new(token_endpoint, transport.clone(), None, false));
	let client = PseudonymServiceClient::new(endpoint, transport, oauth, PseudonymApiConfig::default());

	let request = PseudonymRequest {
		encrypted_personal_id: "blinded-input".to_owned(),
		recipient_organization: "1234".to_owned(),
		recipient_scope: "prs:read".to_owned(),
	};

	let jwe = client.submit(&request).await.expect("Submit should succeed once a bearer token is attached.");

	assert_eq!(jwe.jwe, "some_pseudonym");

	token_grant.assert_calls_async(1).await;
	oprf_eval.assert_calls_async(1).await;
}
