//! Client-assertion JWT construction for the LDN (client-assertion) OAuth path.

// std
use std::time::{SystemTime, UNIX_EPOCH};
// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use sha2::{Digest, Sha256};
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	domain::UraNumber,
	error::{ConfigError, Error},
};

/// Lifetime of the signed client-assertion JWT, matching the token endpoint's tolerance.
const CLIENT_ASSERTION_TTL_SECS: i64 = 1_800;

/// Distinguishes the two certificate types this deployment may be configured with.
///
/// Only [`CertificateKind::Ldn`] requires a signed client assertion; UZI-issued mTLS
/// certificates authenticate the client on the transport layer alone and a [`JwtBuilder`]
/// must not be constructed for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
	/// UZI server certificate; mTLS alone authenticates the client.
	Uzi,
	/// LDN certificate; a signed client-assertion JWT must accompany every grant.
	Ldn,
}

/// Builds signed `client_assertion` JWTs bound to the mTLS certificate via `cnf.x5t#S256`.
pub struct JwtBuilder {
	endpoint: String,
	ura_number: UraNumber,
	mtls_x5t_s256: String,
	signing_key: EncodingKey,
	signing_x5t_s256: String,
	x5c_chain: Vec<String>,
}
impl JwtBuilder {
	/// Constructs a builder from PEM-encoded certificate/key material.
	///
	/// `mtls_cert_pem` is the certificate presented for mTLS; `signing_cert_pem` /
	/// `signing_key_pem` are the certificate (optionally a chain) and private key used to
	/// sign the assertion. When `include_x5c` is set, the full signing certificate chain is
	/// embedded in the JWT header.
	pub fn new(
		endpoint: impl Into<String>,
		ura_number: UraNumber,
		mtls_cert_pem: &str,
		signing_cert_pem: &str,
		signing_key_pem: &str,
		include_x5c: bool,
	) -> Result<Self, ConfigError> {
		let mtls_cert = first_certificate_der(mtls_cert_pem)?;
		let mtls_x5t_s256 = x5t_s256(&mtls_cert);
		let signing_chain = certificates_der(signing_cert_pem)?;
		let signing_x5t_s256 = x5t_s256(&signing_chain[0]);
		let signing_key = EncodingKey::from_rsa_pem(signing_key_pem.as_bytes())
			.map_err(|source| ConfigError::UnsupportedSigningKey { source })?;
		let x5c_chain = if include_x5c {
			signing_chain.iter().map(|der| STANDARD.encode(der)).collect()
		} else {
			Vec::new()
		};

		Ok(Self {
			endpoint: endpoint.into(),
			ura_number,
			mtls_x5t_s256,
			signing_key,
			signing_x5t_s256,
			x5c_chain,
		})
	}

	/// Signs a fresh client-assertion JWT for the given target audience and requested scope.
	pub fn build(&self, target_audience: &str, scope: &str) -> Result<String, Error> {
		let now = unix_now();
		let claims = Claims {
			iss: self.ura_number.to_string(),
			sub: self.ura_number.to_string(),
			aud: self.endpoint.clone(),
			scope: scope.to_owned(),
			target_audience: target_audience.to_owned(),
			iat: now,
			exp: now + CLIENT_ASSERTION_TTL_SECS,
			jti: Uuid::new_v4().to_string(),
			cnf: Confirmation { x5t_s256: self.mtls_x5t_s256.clone() },
		};
		let mut header = Header::new(Algorithm::RS256);

		header.typ = Some("JWT".to_owned());
		header.kid = Some(self.signing_x5t_s256.clone());
		if !self.x5c_chain.is_empty() {
			header.x5c = Some(self.x5c_chain.clone());
		}

		encode(&header, &claims, &self.signing_key)
			.map_err(|source| ConfigError::JwtSigning { source }.into())
	}
}

#[derive(Serialize)]
struct Claims {
	iss: String,
	sub: String,
	aud: String,
	scope: String,
	target_audience: String,
	iat: i64,
	exp: i64,
	jti: String,
	cnf: Confirmation,
}

#[derive(Serialize)]
struct Confirmation {
	#[serde(rename = "x5t#S256")]
	x5t_s256: String,
}

fn unix_now() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Splits a PEM bundle into DER-encoded certificates, preserving order (leaf first).
fn certificates_der(bundle: &str) -> Result<Vec<Vec<u8>>, ConfigError> {
	let certs: Vec<Vec<u8>> = pem::parse_many(bundle.as_bytes())
		.map_err(|source| ConfigError::InvalidCertificate { source })?
		.into_iter()
		.filter(|block| block.tag() == "CERTIFICATE")
		.map(|block| block.contents().to_vec())
		.collect();

	if certs.is_empty() {
		return Err(ConfigError::NoCertificatesFound);
	}

	Ok(certs)
}

fn first_certificate_der(bundle: &str) -> Result<Vec<u8>, ConfigError> {
	Ok(certificates_der(bundle)?.remove(0))
}

/// Computes the base64url (no padding) SHA-256 thumbprint of a DER-encoded certificate.
fn x5t_s256(der: &[u8]) -> String {
	let digest = Sha256::digest(der);

	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn thumbprint_is_url_safe_and_unpadded() {
		let thumbprint = x5t_s256(b"not-a-real-certificate");

		assert!(!thumbprint.contains('+'));
		assert!(!thumbprint.contains('/'));
		assert!(!thumbprint.ends_with('='));
	}

	#[test]
	fn certificates_der_rejects_empty_bundle() {
		let err = certificates_der("").expect_err("Empty PEM bundle must be rejected.");

		assert!(matches!(err, ConfigError::NoCertificatesFound));
	}
}
