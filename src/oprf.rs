//! Oblivious PRF input blinding: domain-separated HKDF derivation followed by a
//! single-party ristretto255 blind, matching the shape the pseudonym service expects.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
// self
use crate::{_prelude::*, domain::PersonalIdentifier, error::PseudonymError};

/// Base64url (with padding) encoded blind factor and blinded input, ready to send to the
/// pseudonym service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlindedInput {
	/// Base64url-encoded scalar used to unblind the pseudonym service's response.
	pub blind_factor: String,
	/// Base64url-encoded blinded point sent to the pseudonym service.
	pub blinded_input: String,
}

/// Derives a domain-separated 32-byte pseudonym seed from a personal identifier and
/// blinds it for a single-party OPRF exchange.
///
/// `info` is built as `"<recipient_organization>|<recipient_scope>|v1"`, matching the
/// domain separation convention used everywhere else this service talks to the pseudonym
/// service.
pub fn create_blinded_input(
	personal_identifier: &PersonalIdentifier,
	recipient_organization: &str,
	recipient_scope: &str,
) -> Result<BlindedInput, PseudonymError> {
	let info = format!("{recipient_organization}|{recipient_scope}|v1");
	let pid_json = serde_json::to_vec(personal_identifier)
		.map_err(|_| PseudonymError::Blinding { reason: "personal identifier could not be serialized" })?;

	let hk = Hkdf::<Sha256>::new(None, &pid_json);
	let mut pseudonym_seed = [0_u8; 32];

	hk.expand(info.as_bytes(), &mut pseudonym_seed)
		.map_err(|_| PseudonymError::Blinding { reason: "HKDF expand failed" })?;

	let (blind_factor, blinded_input) = blind(&pseudonym_seed);

	Ok(BlindedInput {
		blind_factor: URL_SAFE.encode(blind_factor.to_bytes()),
		blinded_input: URL_SAFE.encode(blinded_input.compress().to_bytes()),
	})
}

/// Maps an input byte string onto the ristretto255 group and blinds it with a fresh,
/// uniformly random scalar, mirroring the single-party `blind()` half of an OPRF exchange.
fn blind(input: &[u8; 32]) -> (Scalar, RistrettoPoint) {
	let point = RistrettoPoint::from_uniform_bytes(&expand_to_64(input));
	let mut scalar_bytes = [0_u8; 32];

	OsRng.fill_bytes(&mut scalar_bytes);

	let blind_factor = Scalar::from_bytes_mod_order(scalar_bytes);
	let blinded_input = point * blind_factor;

	(blind_factor, blinded_input)
}

fn expand_to_64(input: &[u8; 32]) -> [u8; 64] {
	let hk = Hkdf::<Sha256>::new(None, input);
	let mut wide = [0_u8; 64];

	hk.expand(b"referral-registration-service|oprf-map|v1", &mut wide)
		.expect("64-byte HKDF expand output is within the RFC 5869 length limit");

	wide
}

/// Parses a base64url-encoded blind factor back into a [`Scalar`], e.g. to unblind a
/// pseudonym-service response locally during testing.
pub fn decode_blind_factor(encoded: &str) -> Result<Scalar, PseudonymError> {
	let bytes = URL_SAFE
		.decode(encoded)
		.map_err(|_| PseudonymError::Blinding { reason: "blind factor is not valid base64url" })?;
	let bytes: [u8; 32] =
		bytes.try_into().map_err(|_| PseudonymError::Blinding { reason: "blind factor must be 32 bytes" })?;

	Ok(Scalar::from_bytes_mod_order(bytes))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fixture() -> PersonalIdentifier {
		PersonalIdentifier { land_code: "NL".to_owned(), kind: "BSN".to_owned(), value: "111222333".to_owned() }
	}

	#[test]
	fn blinding_is_deterministic_for_the_seed_but_randomized_per_call() {
		let a = create_blinded_input(&fixture(), "org-a", "scope-a").expect("Blinding should succeed.");
		let b = create_blinded_input(&fixture(), "org-a", "scope-a").expect("Blinding should succeed.");

		// Same identifier/context, but a fresh random blind factor each call.
		assert_ne!(a.blind_factor, b.blind_factor);
		assert_ne!(a.blinded_input, b.blinded_input);
	}

	#[test]
	fn different_recipients_derive_different_seeds() {
		let a = create_blinded_input(&fixture(), "org-a", "scope-a").expect("Blinding should succeed.");
		let b = create_blinded_input(&fixture(), "org-b", "scope-a").expect("Blinding should succeed.");

		assert_ne!(a.blinded_input, b.blinded_input);
	}

	#[test]
	fn blind_factor_round_trips_through_base64() {
		let blinded = create_blinded_input(&fixture(), "org-a", "scope-a").expect("Blinding should succeed.");
		let scalar = decode_blind_factor(&blinded.blind_factor).expect("Blind factor should decode.");

		assert_eq!(URL_SAFE.encode(scalar.to_bytes()), blinded.blind_factor);
	}
}
