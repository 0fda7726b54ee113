//! Optional observability helpers for service flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `referral_registration.flow` with the
//!   `flow` and `stage` fields.
//! - Enable `metrics` to increment the `referral_registration_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// OAuth token acquisition/refresh.
	OAuth,
	/// OPRF pseudonym blinding.
	Pseudonymize,
	/// NVI referral registration/lookup.
	Nvi,
	/// Metadata-source FHIR bundle retrieval.
	Metadata,
	/// A single domain's synchronization pass.
	Sync,
	/// Scheduler loop lifecycle.
	Scheduler,
	/// Bundle-registration request handling.
	Bundle,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::OAuth => "oauth",
			FlowKind::Pseudonymize => "pseudonymize",
			FlowKind::Nvi => "nvi",
			FlowKind::Metadata => "metadata",
			FlowKind::Sync => "sync",
			FlowKind::Scheduler => "scheduler",
			FlowKind::Bundle => "bundle",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
