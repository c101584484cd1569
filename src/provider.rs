//! Cloud DNS provider
//!
//! The four operations external-dns drives through the webhook: read the
//! current records, normalize proposed endpoints, apply a change-set and
//! report the domain filter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::credentials::CredentialCache;
use crate::dns_client::{all_records, all_zones};
use crate::endpoint::{Changes, DomainFilter, Endpoint};
use crate::error::{Error, Result};
use crate::normalize;
use crate::sync::Synchronizer;

pub struct CloudDnsProvider {
    credentials: Arc<CredentialCache>,
    domain_filter: DomainFilter,
    synchronizer: Synchronizer,
}

impl CloudDnsProvider {
    pub fn new(credentials: Arc<CredentialCache>, domain_filter: DomainFilter, dry_run: bool) -> Self {
        info!(
            "Initialized provider (domain filter: {:?}, exclusions: {:?}, dry run: {})",
            domain_filter.include, domain_filter.exclude, dry_run
        );
        Self {
            synchronizer: Synchronizer::new(Arc::clone(&credentials), dry_run),
            credentials,
            domain_filter,
        }
    }

    /// Filter sent to external-dns during negotiation
    pub fn domain_filter(&self) -> &DomainFilter {
        &self.domain_filter
    }

    /// Every managed record in every zone the filter reaches
    ///
    /// Records sharing a name and type are merged into one endpoint with
    /// several targets, in listing order.
    pub async fn records(&self) -> Result<Vec<Endpoint>> {
        let start = Instant::now();
        let client = self.credentials.client().await;
        let zones = all_zones(client.as_ref())
            .await
            .map_err(|e| e.context("failed to fetch domains"))?;

        let mut endpoints: Vec<Endpoint> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();

        for zone in zones.iter().filter(|z| self.domain_filter.matches_zone(&z.name)) {
            let records = all_records(client.as_ref(), &zone.id)
                .await
                .map_err(|e| e.context(format!("failed to list records for domain {}", zone.name)))?;

            for record in &records {
                let Some(ep) = normalize::record_to_endpoint(record, &zone.name) else {
                    continue;
                };
                if !self.domain_filter.matches(&ep.dns_name) {
                    continue;
                }
                let key = (ep.dns_name.clone(), ep.record_type.clone());
                match index.get(&key) {
                    Some(&i) => merge_into(&mut endpoints[i], ep),
                    None => {
                        index.insert(key, endpoints.len());
                        endpoints.push(ep);
                    }
                }
            }
        }

        debug!(
            "Fetched {} endpoints from {} domains in {:?}",
            endpoints.len(),
            zones.len(),
            start.elapsed()
        );
        Ok(endpoints)
    }

    /// Pre-flight normalization of endpoints proposed by external-dns
    pub fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        normalize::adjust_endpoints(endpoints, &self.domain_filter)
    }

    /// Applies a change-set; all failures are reported in one aggregate error
    pub async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        self.synchronizer.apply(changes).await.map_err(Error::from)
    }
}

fn merge_into(existing: &mut Endpoint, other: Endpoint) {
    for target in other.targets {
        if !existing.targets.contains(&target) {
            existing.targets.push(target);
        }
    }
    if existing.labels.is_empty() {
        existing.labels = other.labels;
    }
}
