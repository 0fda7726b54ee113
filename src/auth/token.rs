//! In-memory OAuth access-token cache implementing client-credentials + refresh grants.

// self
use crate::{
	_prelude::*,
	auth::{JwtBuilder, TokenSecret},
	error::{ConfigError, Error, TokenFetchError},
	http::HttpTransport,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
};

/// Default access-token lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 600;
/// Safety skew subtracted from every expiry so callers never hand out a token that is
/// about to lapse mid-request.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 30;
/// Assumed refresh-token lifetime; the token endpoint never reports this explicitly.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 3_600;

/// A cached OAuth access token, mirroring the shape returned by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
	/// Bearer token value.
	pub access_token: TokenSecret,
	/// Token type reported by the endpoint (normally `Bearer`).
	pub token_type: String,
	/// Space-delimited granted scopes.
	pub scope: String,
	/// Refresh token, when the grant issued one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime in seconds as reported by the endpoint.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Instant this record was added to the cache.
	#[serde(skip, default = "OffsetDateTime::now_utc")]
	pub added_at: OffsetDateTime,
	/// Audience this token was minted for; not part of the wire response.
	#[serde(skip)]
	pub target_audience: String,
}
impl AccessToken {
	/// Returns `true` when every requested scope is present among the token's granted
	/// scopes and the audience matches exactly.
	pub fn has_scope_and_target_audience(&self, scope: &str, target_audience: &str) -> bool {
		let granted: std::collections::HashSet<&str> = self.scope.split_whitespace().collect();
		let requested = scope.split_whitespace();

		requested.into_iter().all(|s| granted.contains(s)) && self.target_audience == target_audience
	}

	/// Returns `true` once the token has crossed its expiry instant, minus skew.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		let ttl = self.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);

		self.added_at + Duration::seconds(ttl) - Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) <= now
	}

	/// Returns `true` once the (assumed) refresh-token lifetime has elapsed.
	pub fn is_refresh_token_expired(&self) -> bool {
		if self.refresh_token.is_none() {
			return true;
		}

		self.added_at + Duration::seconds(REFRESH_TOKEN_TTL_SECS)
			- Duration::seconds(TOKEN_EXPIRY_SKEW_SECS)
			<= OffsetDateTime::now_utc()
	}

	/// Returns `true` when a refresh token is present and still usable.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.is_some() && !self.is_refresh_token_expired()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("added_at", &self.added_at)
			.field("target_audience", &self.target_audience)
			.finish()
	}
}

/// Raw token-endpoint response shape, before the audience/timestamp are stamped on.
#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	token_type: String,
	scope: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}
impl TokenResponse {
	fn into_access_token(self, target_audience: &str) -> AccessToken {
		AccessToken {
			access_token: TokenSecret::new(self.access_token),
			token_type: self.token_type,
			scope: self.scope,
			refresh_token: self.refresh_token.map(TokenSecret::new),
			expires_in: self.expires_in,
			added_at: OffsetDateTime::now_utc(),
			target_audience: target_audience.to_owned(),
		}
	}
}

/// Fetches and caches OAuth access tokens for the client-credentials + refresh grants.
///
/// A single [`tokio::sync::Mutex`] serializes every cache mutation, including the
/// network round-trip performed inside the critical section, so two concurrent callers
/// requesting the same scope/audience never perform duplicate grants.
pub struct OAuthTokenService {
	endpoint: Url,
	transport: HttpTransport,
	jwt_builder: Option<JwtBuilder>,
	mock: bool,
	tokens: tokio::sync::Mutex<Vec<AccessToken>>,
}
impl OAuthTokenService {
	/// Constructs a token service pointed at the given token endpoint.
	///
	/// `jwt_builder` must be `Some` only when the deployment's mTLS certificate is an LDN
	/// certificate; UZI certificates authenticate on the transport alone.
	pub fn new(
		endpoint: Url,
		transport: HttpTransport,
		jwt_builder: Option<JwtBuilder>,
		mock: bool,
	) -> Self {
		Self { endpoint, transport, jwt_builder, mock, tokens: tokio::sync::Mutex::new(Vec::new()) }
	}

	/// Returns a valid access token for the given scope and target audience, reusing a
	/// cached token, refreshing an expired-but-refreshable one, or performing a fresh
	/// client-credentials grant, in that order of preference.
	pub async fn fetch_token(&self, scope: &str, target_audience: &str) -> Result<AccessToken, Error> {
		let span = FlowSpan::new(FlowKind::OAuth, "fetch_token");

		if self.mock {
			record_flow_outcome(FlowKind::OAuth, FlowOutcome::Success);

			return Ok(AccessToken {
				access_token: TokenSecret::new("mock-access-token"),
				token_type: "Bearer".to_owned(),
				scope: scope.to_owned(),
				refresh_token: None,
				expires_in: None,
				added_at: OffsetDateTime::now_utc(),
				target_audience: target_audience.to_owned(),
			});
		}

		record_flow_outcome(FlowKind::OAuth, FlowOutcome::Attempt);

		let outcome = span.instrument(self.fetch_token_inner(scope, target_audience)).await;

		match &outcome {
			Ok(_) => record_flow_outcome(FlowKind::OAuth, FlowOutcome::Success),
			Err(_) => record_flow_outcome(FlowKind::OAuth, FlowOutcome::Failure),
		}

		outcome
	}

	async fn fetch_token_inner(&self, scope: &str, target_audience: &str) -> Result<AccessToken, Error> {
		let mut tokens = self.tokens.lock().await;

		tokens.retain(|t| !t.is_expired() || t.can_refresh());

		if let Some(token) =
			tokens.iter().rev().find(|t| t.has_scope_and_target_audience(scope, target_audience) && !t.is_expired())
		{
			return Ok(token.clone());
		}

		let refreshable_index = tokens
			.iter()
			.rev()
			.position(|t| t.has_scope_and_target_audience(scope, target_audience) && t.is_expired() && t.can_refresh());

		let result = if let Some(rev_index) = refreshable_index {
			let index = tokens.len() - 1 - rev_index;
			let stale = tokens.remove(index);

			self.refresh(&stale, target_audience).await
		} else {
			self.grant_client_credentials(scope, target_audience).await
		};

		let token = result?;

		tokens.push(token.clone());

		Ok(token)
	}

	async fn refresh(&self, stale: &AccessToken, target_audience: &str) -> Result<AccessToken, Error> {
		let refresh_token =
			stale.refresh_token.as_ref().ok_or(ConfigError::MissingRefreshToken)?.expose().to_owned();
		let mut form = vec![
			("grant_type", "refresh_token".to_owned()),
			("refresh_token", refresh_token),
			("target_audience", target_audience.to_owned()),
		];

		self.sign_if_ldn(&mut form, &stale.scope, target_audience)?;

		self.call_token_endpoint(form, target_audience).await
	}

	async fn grant_client_credentials(&self, scope: &str, target_audience: &str) -> Result<AccessToken, Error> {
		let mut form = vec![
			("grant_type", "client_credentials".to_owned()),
			("scope", scope.to_owned()),
			("target_audience", target_audience.to_owned()),
		];

		self.sign_if_ldn(&mut form, scope, target_audience)?;

		self.call_token_endpoint(form, target_audience).await
	}

	fn sign_if_ldn(
		&self,
		form: &mut Vec<(&'static str, String)>,
		scope: &str,
		target_audience: &str,
	) -> Result<(), Error> {
		if let Some(builder) = &self.jwt_builder {
			let assertion = builder.build(target_audience, scope)?;

			form.push((
				"client_assertion_type",
				"urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_owned(),
			));
			form.push(("client_assertion", assertion));
		}

		Ok(())
	}

	async fn call_token_endpoint(
		&self,
		form: Vec<(&'static str, String)>,
		target_audience: &str,
	) -> Result<AccessToken, Error> {
		let response: TokenResponse = self
			.transport
			.post_form(self.endpoint.clone(), &form)
			.await
			.map_err(TokenFetchError::from)?;

		Ok(response.into_access_token(target_audience))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn token(scope: &str, audience: &str, expires_in: Option<i64>, added_at: OffsetDateTime) -> AccessToken {
		AccessToken {
			access_token: TokenSecret::new("tok"),
			token_type: "Bearer".to_owned(),
			scope: scope.to_owned(),
			refresh_token: None,
			expires_in,
			added_at,
			target_audience: audience.to_owned(),
		}
	}

	#[test]
	fn scope_matching_is_subset_not_equality() {
		let t = token("read write", "https://aud.example", Some(600), OffsetDateTime::now_utc());

		assert!(t.has_scope_and_target_audience("read", "https://aud.example"));
		assert!(t.has_scope_and_target_audience("read write", "https://aud.example"));
		assert!(!t.has_scope_and_target_audience("read delete", "https://aud.example"));
		assert!(!t.has_scope_and_target_audience("read", "https://other.example"));
	}

	#[test]
	fn expiry_applies_skew() {
		let now = OffsetDateTime::now_utc();
		let t = token("read", "aud", Some(60), now - Duration::seconds(35));

		assert!(t.is_expired(), "Token within the skew window of its expiry must read as expired.");

		let fresh = token("read", "aud", Some(600), now);

		assert!(!fresh.is_expired());
	}

	#[test]
	fn default_ttl_applies_when_expires_in_missing() {
		let now = OffsetDateTime::now_utc();
		let t = token("read", "aud", None, now - Duration::seconds(DEFAULT_TOKEN_TTL_SECS - 5));

		assert!(!t.is_expired());

		let t = token("read", "aud", None, now - Duration::seconds(DEFAULT_TOKEN_TTL_SECS + 5));

		assert!(t.is_expired());
	}

	#[test]
	fn refresh_expiry_uses_longer_window() {
		let now = OffsetDateTime::now_utc();
		let mut t = token("read", "aud", Some(60), now - Duration::seconds(3_700));

		assert!(t.is_refresh_token_expired(), "No refresh token at all must read as expired.");

		t.refresh_token = Some(TokenSecret::new("rt"));

		assert!(t.is_refresh_token_expired());
		assert!(!t.can_refresh());

		let fresh = {
			let mut t = token("read", "aud", Some(60), now - Duration::seconds(100));

			t.refresh_token = Some(TokenSecret::new("rt"));
			t
		};

		assert!(fresh.can_refresh());
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn mock_mode_returns_a_fixed_token_without_contacting_the_endpoint() {
		use httpmock::MockServer;

		let server = MockServer::start_async().await;
		let hit = server.mock_async(|_when, then| { then.status(500); }).await;

		let endpoint = Url::parse(&server.base_url()).unwrap();
		let transport = crate::http::HttpTransport::with_client(ReqwestClient::new());
		let service = OAuthTokenService::new(endpoint, transport, None, true);

		let token = service.fetch_token("x", "y").await.expect("Mock mode never fails.");

		assert_eq!(token.access_token.expose(), "mock-access-token");
		assert_eq!(token.token_type, "Bearer");
		assert_eq!(token.scope, "x");

		hit.assert_hits_async(0).await;
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn expired_but_refreshable_token_is_replaced_via_a_single_refresh_call() {
		use httpmock::prelude::*;

		let server = MockServer::start_async().await;
		let refresh_call = server
			.mock_async(|when, then| {
				when.method(POST).path("/token").body_contains("grant_type=refresh_token");
				then.status(200).header("content-type", "application/json").json_body(serde_json::json!({
					"access_token": "new-access-token",
					"token_type": "Bearer",
					"scope": "epd:read",
					"refresh_token": "new-refresh-token",
					"expires_in": 600,
				}));
			})
			.await;

		let endpoint = Url::parse(&server.base_url()).unwrap().join("/token").unwrap();
		let transport = crate::http::HttpTransport::with_client(ReqwestClient::new());
		let service = OAuthTokenService::new(endpoint.clone(), transport, None, false);

		{
			let mut tokens = service.tokens.lock().await;
			let mut stale = token("epd:read", endpoint.as_str(), Some(60), OffsetDateTime::now_utc() - Duration::seconds(120));

			stale.refresh_token = Some(TokenSecret::new("old-refresh-token"));
			tokens.push(stale);
		}

		let refreshed = service.fetch_token("epd:read", endpoint.as_str()).await.expect("Refresh should succeed.");

		assert_eq!(refreshed.access_token.expose(), "new-access-token");

		let cached = service.tokens.lock().await;

		assert_eq!(cached.len(), 1, "The stale token must be evicted, not merely supplemented.");
		assert_eq!(cached[0].access_token.expose(), "new-access-token");

		refresh_call.assert_calls_async(1).await;
	}
}
