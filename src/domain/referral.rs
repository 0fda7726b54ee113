//! Referral registration request/query/entity types exchanged with NVI.

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	domain::{DataDomain, UraNumber, pseudonym::OprfPseudonymJwe},
};

/// Request to register a new referral with NVI.
///
/// NVI's wire shape nests these fields inside FHIR `subject`/`source`/`sourceType`/
/// `careContext` objects rather than serializing this struct flatly (see
/// [`crate::fhir::create_referral_request_to_fhir`]), so this type carries no [`Serialize`]
/// impl of its own.
#[derive(Clone, Debug)]
pub struct CreateReferralRequest {
	/// JWE-wrapped pseudonym.
	pub oprf_jwe: OprfPseudonymJwe,
	/// Base64url-encoded blind factor.
	pub blind_factor: String,
	/// Source organization URA.
	pub ura_number: UraNumber,
	/// Source organization type code.
	pub organization_type: String,
	/// Data domain the referral belongs to.
	pub data_domain: DataDomain,
}

/// Query parameters for looking up an existing referral on NVI.
///
/// `oprf_jwe` and `blind_factor` must both be present or both be absent; see
/// [`ReferralQuery::new`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralQuery {
	/// JWE-wrapped pseudonym, serialized as `pseudonym`.
	#[serde(rename = "pseudonym", skip_serializing_if = "Option::is_none")]
	pub oprf_jwe: Option<OprfPseudonymJwe>,
	/// Base64url-encoded blind factor, serialized as `oprfKey`.
	#[serde(rename = "oprfKey", skip_serializing_if = "Option::is_none")]
	pub blind_factor: Option<String>,
	/// Data domain scope, serialized as `careContext`.
	#[serde(rename = "careContext", skip_serializing_if = "Option::is_none")]
	pub data_domain: Option<DataDomain>,
	/// Source organization URA, serialized as `source`.
	#[serde(rename = "source")]
	pub ura_number: UraNumber,
}
impl ReferralQuery {
	/// Builds a query, enforcing that the pseudonym and blind factor are supplied together.
	pub fn new(
		ura_number: UraNumber,
		oprf_jwe: Option<OprfPseudonymJwe>,
		blind_factor: Option<String>,
		data_domain: Option<DataDomain>,
	) -> Result<Self, &'static str> {
		if oprf_jwe.is_some() != blind_factor.is_some() {
			return Err("oprf_jwe and blind_factor must both be provided or both be omitted");
		}

		Ok(Self { oprf_jwe, blind_factor, data_domain, ura_number })
	}

	/// Renders this query as `(name, value)` URL query parameters, using NVI's FHIR field
	/// aliases (`pseudonym`, `oprfKey`, `careContext`, `source`).
	pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs = vec![("source", self.ura_number.to_string())];

		if let Some(oprf_jwe) = &self.oprf_jwe {
			pairs.push(("pseudonym", oprf_jwe.jwe.clone()));
		}
		if let Some(blind_factor) = &self.blind_factor {
			pairs.push(("oprfKey", blind_factor.clone()));
		}
		if let Some(data_domain) = &self.data_domain {
			pairs.push(("careContext", data_domain.to_string()));
		}

		pairs
	}
}

/// A registered referral as returned by NVI.
///
/// NVI's wire representation nests these fields inside FHIR-shaped coding arrays (see
/// [`crate::fhir::parse_referral_entity`]), so this type has no direct [`Deserialize`] impl.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralEntity {
	/// NVI-assigned identifier.
	pub id: Uuid,
	/// Source organization URA.
	pub ura_number: UraNumber,
	/// Data domain the referral belongs to.
	pub data_domain: DataDomain,
	/// Source organization type code.
	pub organization_type: String,
}
