//! Pseudonym and personal-identifier types exchanged with the pseudonym service.

// self
use crate::_prelude::*;

/// A country-scoped personal identifier (e.g. a Dutch BSN) as exchanged with the
/// pseudonym service, prior to blinding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalIdentifier {
	/// ISO country code the identifier is scoped to (e.g. `"NL"`).
	pub land_code: String,
	/// Identifier type (e.g. `"BSN"`).
	#[serde(rename = "type")]
	pub kind: String,
	/// The raw identifier value.
	pub value: String,
}

/// A resolved pseudonym string returned by the pseudonym service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pseudonym {
	/// The opaque pseudonym value.
	pub pseudonym: String,
}

/// Request body sent to the pseudonym service's register/lookup endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudonymRequest {
	/// Base64url-encoded blinded input produced by the OPRF client.
	pub encrypted_personal_id: String,
	/// Organization URA requesting the pseudonym.
	pub recipient_organization: String,
	/// Scope under which the pseudonym is requested.
	pub recipient_scope: String,
}

/// A pseudonym wrapped in a JWE envelope, as returned by the OPRF-based register flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OprfPseudonymJwe {
	/// Compact-serialized JWE string; must be non-empty.
	pub jwe: String,
}
