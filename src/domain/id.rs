//! Validated domain identifiers: URA numbers, BSNs, and data-domain labels.

// std
use std::ops::Deref;
// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::ConfigError};

/// An 8-digit (zero-padded) URA number identifying a healthcare provider organization.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UraNumber(String);
impl UraNumber {
	/// Validates and zero-pads a raw URA value (accepted as up to 8 ASCII digits).
	pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
		let raw = value.as_ref();

		if raw.is_empty() || raw.len() > 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
			return Err(ConfigError::InvalidUraNumber {
				value: raw.to_owned(),
				reason: "must be 1 to 8 ASCII digits",
			});
		}

		Ok(Self(format!("{raw:0>8}")))
	}
}
impl Deref for UraNumber {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for UraNumber {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<UraNumber> for String {
	fn from(value: UraNumber) -> Self {
		value.0
	}
}
impl TryFrom<String> for UraNumber {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for UraNumber {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "UraNumber({})", self.0)
	}
}
impl Display for UraNumber {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for UraNumber {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// A 9-digit Dutch citizen service number (BSN), validated with the elfproef checksum.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bsn(String);
impl Bsn {
	/// Validates a raw BSN string: exactly 9 digits, satisfying the elfproef checksum.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
		let raw = value.as_ref();

		if raw.len() != 9 || !raw.bytes().all(|b| b.is_ascii_digit()) {
			return Err(ConfigError::InvalidBsn { reason: "must be exactly 9 digits" });
		}

		let digits: Vec<i64> = raw.chars().map(|c| c.to_digit(10).unwrap() as i64).collect();
		let checksum: i64 =
			digits[..8].iter().enumerate().map(|(idx, d)| d * (9 - idx as i64)).sum::<i64>() - digits[8];

		if checksum % 11 != 0 {
			return Err(ConfigError::InvalidBsn { reason: "failed the elfproef checksum" });
		}

		Ok(Self(raw.to_owned()))
	}

	/// Returns the SHA-256 hex digest of the BSN value, used by the legacy pseudonym flow.
	pub fn hash(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		digest.iter().map(|b| format!("{b:02x}")).collect()
	}
}
impl Deref for Bsn {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for Bsn {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<Bsn> for String {
	fn from(value: Bsn) -> Self {
		value.0
	}
}
impl TryFrom<String> for Bsn {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for Bsn {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Bsn(<redacted>)")
	}
}
impl Display for Bsn {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl FromStr for Bsn {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// An opaque, validated data-domain label (e.g. `"beeldbank"`, `"medicatie verklaring"`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataDomain(String);
impl DataDomain {
	/// Validates a raw data-domain label: non-empty, no leading/trailing whitespace.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
		let raw = value.as_ref();

		if raw.is_empty() {
			return Err(ConfigError::InvalidDataDomain { reason: "cannot be empty" });
		}
		if raw.trim() != raw {
			return Err(ConfigError::InvalidDataDomain { reason: "cannot have leading/trailing whitespace" });
		}

		Ok(Self(raw.to_owned()))
	}
}
impl Deref for DataDomain {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for DataDomain {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<DataDomain> for String {
	fn from(value: DataDomain) -> Self {
		value.0
	}
}
impl TryFrom<String> for DataDomain {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for DataDomain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DataDomain({})", self.0)
	}
}
impl Display for DataDomain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for DataDomain {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn ura_number_zero_pads() {
		let ura = UraNumber::new("1234").expect("Short URA values should zero-pad.");

		assert_eq!(ura.as_ref(), "00001234");
		assert!(UraNumber::new("123456789").is_err(), "Over-length URA values must be rejected.");
		assert!(UraNumber::new("12a4").is_err(), "Non-digit URA values must be rejected.");
	}

	#[test]
	fn bsn_validates_elfproef() {
		assert!(Bsn::new("111222333").is_ok(), "Known-valid BSN fixture should pass the elfproef.");
		assert!(Bsn::new("123456789").is_err(), "Known-invalid BSN fixture must fail the elfproef.");
		assert!(Bsn::new("12345678").is_err(), "Eight-digit input must be rejected on length.");
	}

	#[test]
	fn bsn_hash_is_deterministic_and_redacted() {
		let bsn = Bsn::new("111222333").expect("BSN fixture should be valid.");

		assert_eq!(bsn.hash(), bsn.hash());
		assert_eq!(format!("{bsn:?}"), "Bsn(<redacted>)");
	}

	#[test]
	fn data_domain_rejects_padding() {
		assert!(DataDomain::new("beeldbank").is_ok());
		assert!(DataDomain::new(" beeldbank").is_err());
		assert!(DataDomain::new("").is_err());
	}
}
