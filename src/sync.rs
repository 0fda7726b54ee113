//! Synchronization engine: per-domain metadata fetch → referral registration → high-water
//! mark advancement.

// self
use crate::{
	_prelude::*,
	domain::{Bsn, BsnUpdateScheme, DataDomain, DomainMapEntry, DomainsMap, UpdateScheme},
	error::Error,
	metadata::MetadataSourceClient,
	nvi::NviClient,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
	pseudonym::PseudonymServiceClient,
	registration::ReferralRegistrationService,
};

/// Drives per-domain synchronization between the metadata source and NVI.
///
/// Healthchecks run once per [`Self::synchronize_domain`] call (§4.8 step 1), not per BSN.
pub struct SynchronizationEngine {
	registration: Arc<ReferralRegistrationService>,
	metadata_client: Arc<MetadataSourceClient>,
	nvi_client: Arc<NviClient>,
	pseudonym_client: Arc<PseudonymServiceClient>,
	allowed_domains: Vec<DataDomain>,
	domains: Mutex<DomainsMap>,
}
impl SynchronizationEngine {
	/// Builds the engine with one [`DomainMapEntry`] per configured domain.
	pub fn new(
		registration: Arc<ReferralRegistrationService>,
		metadata_client: Arc<MetadataSourceClient>,
		nvi_client: Arc<NviClient>,
		pseudonym_client: Arc<PseudonymServiceClient>,
		allowed_domains: Vec<DataDomain>,
	) -> Self {
		let domains = allowed_domains.iter().map(|d| (d.clone(), DomainMapEntry::default())).collect();

		Self { registration, metadata_client, nvi_client, pseudonym_client, allowed_domains, domains: Mutex::new(domains) }
	}

	/// Returns the configured set of data domains, used by the boundary to validate inbound
	/// requests.
	pub fn get_allowed_domains(&self) -> &[DataDomain] {
		&self.allowed_domains
	}

	/// Synchronizes every configured domain, in order, merging each domain's result.
	pub async fn synchronize_all_domains(&self) -> Result<HashMap<DataDomain, Vec<UpdateScheme>>> {
		let mut merged = HashMap::new();

		for domain in &self.allowed_domains {
			merged.extend(self.synchronize_domain(domain).await?);
		}

		Ok(merged)
	}

	/// Synchronizes a single domain: healthcheck, fetch updated BSNs, register referrals,
	/// advance the high-water mark.
	///
	/// Fails fast if any upstream is unhealthy; no state is advanced in that case. Any BSN
	/// registration failure aborts the remaining BSNs for this domain without rewinding the
	/// high-water mark already written earlier in the loop.
	pub async fn synchronize_domain(&self, domain: &DataDomain) -> Result<HashMap<DataDomain, Vec<UpdateScheme>>> {
		let span = FlowSpan::new(FlowKind::Sync, "synchronize_domain");

		record_flow_outcome(FlowKind::Sync, FlowOutcome::Attempt);

		let outcome = span.instrument(self.synchronize_domain_inner(domain)).await;

		record_flow_outcome(FlowKind::Sync, if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure });

		let entry = outcome?;
		let mut result = HashMap::with_capacity(1);

		result.insert(domain.clone(), vec![entry]);

		Ok(result)
	}

	async fn synchronize_domain_inner(&self, domain: &DataDomain) -> Result<UpdateScheme> {
		self.healthcheck_apis().await?;

		let mut current_last = self.domains.lock().last_resource_update_of(domain);
		let (bsns, latest_timestamp) =
			self.metadata_client.get_update_scheme(domain.as_ref(), current_last.as_deref()).await?;
		let mut updated_data = Vec::new();

		for raw_bsn in bsns {
			let bsn = Bsn::new(raw_bsn)?;
			let referral = self.registration.register(&bsn, domain).await?;

			let Some(referral) = referral else { continue };

			if let Some(latest) = &latest_timestamp {
				if current_last.as_deref() != Some(latest.as_str()) {
					current_last = Some(latest.clone());
					self.domains.lock().set_last_resource_update(domain, current_last.clone());
				}
			}

			updated_data.push(BsnUpdateScheme { bsn, referral });
		}

		let domain_entry = self.domains.lock().entry_of(domain);

		Ok(UpdateScheme { updated_data, domain_entry })
	}

	async fn healthcheck_apis(&self) -> Result<()> {
		if !self.nvi_client.server_healthy().await {
			return Err(Error::UnhealthyUpstream { upstream: "nvi" });
		}
		if !self.pseudonym_client.server_healthy().await {
			return Err(Error::UnhealthyUpstream { upstream: "pseudonym" });
		}
		if !self.metadata_client.server_healthy().await {
			return Err(Error::UnhealthyUpstream { upstream: "metadata" });
		}

		Ok(())
	}

	/// Resets the high-water mark for one domain, or every domain when `domain` is `None`.
	pub fn clear_cache(&self, domain: Option<&DataDomain>) {
		let mut domains = self.domains.lock();

		match domain {
			Some(domain) => {
				domains.insert(domain.clone(), DomainMapEntry::default());
			},
			None => {
				for entry in domains.values_mut() {
					*entry = DomainMapEntry::default();
				}
			},
		}
	}
}

trait DomainsMapExt {
	fn last_resource_update_of(&self, domain: &DataDomain) -> Option<String>;
	fn set_last_resource_update(&mut self, domain: &DataDomain, value: Option<String>);
	fn entry_of(&self, domain: &DataDomain) -> DomainMapEntry;
}
impl DomainsMapExt for DomainsMap {
	fn last_resource_update_of(&self, domain: &DataDomain) -> Option<String> {
		self.get(domain).and_then(|entry| entry.last_resource_update.clone())
	}

	fn set_last_resource_update(&mut self, domain: &DataDomain, value: Option<String>) {
		self.entry(domain.clone()).or_default().last_resource_update = value;
	}

	fn entry_of(&self, domain: &DataDomain) -> DomainMapEntry {
		self.get(domain).cloned().unwrap_or_default()
	}
}
