//! Result shape returned by a single domain synchronization pass.

// self
use crate::{
	_prelude::*,
	domain::{Bsn, ReferralEntity, domain_map::DomainMapEntry},
};

/// One BSN that was synchronized, paired with the referral NVI now holds for it.
#[derive(Clone, Debug)]
pub struct BsnUpdateScheme {
	/// The BSN that was synchronized.
	pub bsn: Bsn,
	/// The referral registered or found for this BSN.
	pub referral: ReferralEntity,
}

/// The outcome of synchronizing a single data domain.
#[derive(Clone, Debug)]
pub struct UpdateScheme {
	/// Every BSN processed during this synchronization pass.
	pub updated_data: Vec<BsnUpdateScheme>,
	/// The domain map entry's state after this pass (possibly advanced high-water mark).
	pub domain_entry: DomainMapEntry,
}
