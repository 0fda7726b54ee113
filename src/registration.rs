//! Per-BSN referral registration: OPRF blind, pseudonym evaluation, NVI existence check + submit.

// self
use crate::{
	_prelude::*,
	domain::{
		Bsn, CreateReferralRequest, DataDomain, PersonalIdentifier, PseudonymRequest, ReferralEntity, ReferralQuery,
		UraNumber,
	},
	nvi::NviClient,
	oprf,
	pseudonym::PseudonymServiceClient,
};

/// Per-request defaults shared by every call to [`ReferralRegistrationService::register`].
#[derive(Clone, Debug)]
pub struct RegistrationDefaults {
	/// This deployment's own URA number, used both as the recipient organization and as the
	/// `source` on every submitted referral.
	pub ura_number: UraNumber,
	/// Organization type code stamped on every referral this deployment submits.
	pub default_organization_type: String,
}

/// Composes the OPRF client, pseudonym service, and NVI client into the registration pipeline.
pub struct ReferralRegistrationService {
	pseudonym_client: Arc<PseudonymServiceClient>,
	nvi_client: Arc<NviClient>,
	defaults: RegistrationDefaults,
}
impl ReferralRegistrationService {
	/// Builds a registration service from its collaborators.
	pub fn new(
		pseudonym_client: Arc<PseudonymServiceClient>,
		nvi_client: Arc<NviClient>,
		defaults: RegistrationDefaults,
	) -> Self {
		Self { pseudonym_client, nvi_client, defaults }
	}

	/// Registers a referral for `(bsn, data_domain)`, unless NVI already holds one.
	///
	/// Returns `Ok(None)` when NVI's existence check reports the referral already exists —
	/// idempotency is enforced by observed state at NVI, not locally. Any failure in the
	/// pipeline (OPRF blinding, pseudonym evaluation, or either NVI call) is fatal to this
	/// BSN; callers decide whether to continue with the next one.
	pub async fn register(&self, bsn: &Bsn, data_domain: &DataDomain) -> Result<Option<ReferralEntity>> {
		let recipient_organization = format!("ura:{}", self.defaults.ura_number);
		let recipient_scope = "nationale-verwijsindex";
		let personal_identifier =
			PersonalIdentifier { land_code: "NL".to_owned(), kind: "BSN".to_owned(), value: bsn.as_ref().to_owned() };

		let blinded = oprf::create_blinded_input(&personal_identifier, &recipient_organization, recipient_scope)?;
		let pseudonym_request = PseudonymRequest {
			encrypted_personal_id: blinded.blinded_input,
			recipient_organization,
			recipient_scope: recipient_scope.to_owned(),
		};
		let jwe = self.pseudonym_client.submit(&pseudonym_request).await?;

		let query = ReferralQuery::new(
			self.defaults.ura_number.clone(),
			Some(jwe.clone()),
			Some(blinded.blind_factor.clone()),
			Some(data_domain.clone()),
		)
		.expect("oprf_jwe and blind_factor are supplied together");

		if self.nvi_client.is_referral_registered(&query).await? {
			return Ok(None);
		}

		let request = CreateReferralRequest {
			oprf_jwe: jwe,
			blind_factor: blinded.blind_factor,
			ura_number: self.defaults.ura_number.clone(),
			organization_type: self.defaults.default_organization_type.clone(),
			data_domain: data_domain.clone(),
		};

		Ok(Some(self.nvi_client.submit(&request).await?))
	}
}
