//! mTLS-capable HTTP transport shared by every upstream client.
//!
//! Unlike a library meant to plug into arbitrary downstream HTTP stacks, this service
//! always talks to its upstreams (OAuth, pseudonym service, NVI, metadata source) over one
//! fixed, mutually authenticated transport, so [`HttpTransport`] is a concrete wrapper
//! rather than a generic trait.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Per-client mTLS + timeout configuration used to build an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
	/// PEM-encoded client certificate (and optional chain) presented for mTLS.
	pub client_cert_pem: String,
	/// PEM-encoded private key matching `client_cert_pem`.
	pub client_key_pem: String,
	/// PEM-encoded CA bundle used to verify the upstream's server certificate, when set.
	/// When `None`, the platform's default trust store is used.
	pub ca_cert_pem: Option<String>,
	/// Request timeout applied to every call made through this transport.
	pub timeout: Duration,
}

/// Thin wrapper around [`ReqwestClient`] configured for one upstream's mTLS identity.
#[derive(Clone)]
pub struct HttpTransport {
	client: ReqwestClient,
}
impl HttpTransport {
	/// Builds a transport from mTLS identity material and a request timeout.
	pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
		let mut identity_pem = Vec::with_capacity(
			config.client_cert_pem.len() + config.client_key_pem.len(),
		);

		identity_pem.extend_from_slice(config.client_cert_pem.as_bytes());
		identity_pem.extend_from_slice(config.client_key_pem.as_bytes());

		let identity = reqwest::Identity::from_pem(&identity_pem)?;
		let mut builder = ReqwestClient::builder()
			.use_rustls_tls()
			.identity(identity)
			.timeout(std::time::Duration::from_secs_f64(config.timeout.as_seconds_f64()));

		if let Some(ca) = &config.ca_cert_pem {
			let ca_cert = reqwest::Certificate::from_pem(ca.as_bytes())?;

			builder = builder.add_root_certificate(ca_cert);
		}

		let client = builder.build()?;

		Ok(Self { client })
	}

	/// Wraps an already-constructed reqwest client (primarily for tests).
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client }
	}

	/// Performs a `POST` with an `application/x-www-form-urlencoded` body and deserializes
	/// the JSON response.
	pub async fn post_form<T>(&self, url: Url, form: &[(&str, String)]) -> Result<T, TransportError>
	where
		T: serde::de::DeserializeOwned,
	{
		let response = self.client.post(url).form(form).send().await.map_err(TransportError::from)?;

		Self::deserialize_response(response).await
	}

	/// Performs a `POST` with a JSON body and deserializes the JSON response.
	pub async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, TransportError>
	where
		B: Serialize,
		T: serde::de::DeserializeOwned,
	{
		let response = self.client.post(url).json(body).send().await.map_err(TransportError::from)?;

		Self::deserialize_response(response).await
	}

	/// Performs a bearer-authenticated `POST` with a JSON body and deserializes the JSON
	/// response.
	pub async fn post_json_bearer<B, T>(&self, url: Url, bearer_token: &str, body: &B) -> Result<T, TransportError>
	where
		B: Serialize,
		T: serde::de::DeserializeOwned,
	{
		let response =
			self.client.post(url).bearer_auth(bearer_token).json(body).send().await.map_err(TransportError::from)?;

		Self::deserialize_response(response).await
	}

	/// Performs a `GET` with the given query parameters and deserializes the JSON response.
	pub async fn get_json<T>(&self, url: Url, query: &[(&str, String)]) -> Result<T, TransportError>
	where
		T: serde::de::DeserializeOwned,
	{
		let response = self.client.get(url).query(query).send().await.map_err(TransportError::from)?;

		Self::deserialize_response(response).await
	}

	/// Performs a bearer-authenticated `GET` with the given query parameters.
	pub async fn get_json_bearer<T>(
		&self,
		url: Url,
		bearer_token: &str,
		query: &[(&str, String)],
	) -> Result<T, TransportError>
	where
		T: serde::de::DeserializeOwned,
	{
		let response = self
			.client
			.get(url)
			.bearer_auth(bearer_token)
			.query(query)
			.send()
			.await
			.map_err(TransportError::from)?;

		Self::deserialize_response(response).await
	}

	async fn deserialize_response<T>(response: reqwest::Response) -> Result<T, TransportError>
	where
		T: serde::de::DeserializeOwned,
	{
		let status = response.status();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		if !status.is_success() {
			return Err(TransportError::Status {
				status: status.as_u16(),
				body: String::from_utf8_lossy(&bytes).into_owned(),
			});
		}

		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map_err(|source| TransportError::ResponseParse { source })
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn with_client_wraps_a_bare_client() {
		let client = ReqwestClient::new();
		let _transport = HttpTransport::with_client(client);
	}
}
