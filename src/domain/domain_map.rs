//! Per-domain synchronization bookkeeping: the high-water-mark map.
//!
//! A [`DataDomain`] doubles as the FHIR resource type queried from the metadata source
//! (e.g. `ImagingStudy`), so one entry per configured domain is all the state that needs
//! tracking — there is no separate resource-type field to keep in sync.

// self
use crate::{_prelude::*, domain::DataDomain};

/// High-water mark tracked for one data domain. Monotonic: once advanced, never rewound
/// except via an explicit cache clear.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMapEntry {
	/// ISO-8601 instant of the most recently registered resource, if any.
	#[serde(default)]
	pub last_resource_update: Option<String>,
}

/// In-memory map from data domain to its tracked high-water mark, one entry per
/// configured domain.
pub type DomainsMap = HashMap<DataDomain, DomainMapEntry>;
