//! Core domain value types: identifiers, pseudonyms, referrals, and sync bookkeeping.

pub mod domain_map;
pub mod id;
pub mod pseudonym;
pub mod referral;
pub mod update_scheme;

pub use domain_map::*;
pub use id::*;
pub use pseudonym::*;
pub use referral::*;
pub use update_scheme::*;
