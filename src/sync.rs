//! Record synchronization
//!
//! Turns an external-dns change-set into Cloud DNS calls. Deletes run
//! first, then creates, then updates. Every endpoint is attempted; failures
//! are collected and reported together once the whole change-set has run.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::credentials::CredentialCache;
use crate::dns_client::{all_records, DnsClient, NewRecord, Zone};
use crate::endpoint::{Changes, Endpoint};
use crate::error::{AggregateError, Error, Operation, Result};
use crate::metrics;
use crate::normalize::{
    bare_name, canonical_name, floor_ttl, labels_comment, record_fqdn, strip_quotes,
};
use crate::zones::find_zone;

/// Applies change-sets with the shared session
pub struct Synchronizer {
    credentials: Arc<CredentialCache>,
    dry_run: bool,
}

impl Synchronizer {
    pub fn new(credentials: Arc<CredentialCache>, dry_run: bool) -> Self {
        Self {
            credentials,
            dry_run,
        }
    }

    /// Applies `changes`, returning every failed record on error
    ///
    /// In dry-run mode nothing is sent to Cloud DNS, not even identity.
    pub async fn apply(&self, changes: &Changes) -> std::result::Result<(), AggregateError> {
        info!(
            "Applying changes: {} create, {} update, {} delete",
            changes.create.len(),
            changes.update_new.len(),
            changes.delete.len()
        );
        if self.dry_run {
            info!("Dry run enabled, skipping changes");
            return Ok(());
        }
        if changes.is_empty() {
            return Ok(());
        }

        let _timer = metrics::start_apply_timer();
        let client = self.credentials.client().await;
        let client = client.as_ref();
        let mut failures = AggregateError::new();

        for ep in &changes.delete {
            if let Err(e) = delete_endpoint(client, ep).await {
                record_failure(&mut failures, Operation::Delete, ep, e);
            }
        }
        for ep in &changes.create {
            if let Err(e) = create_endpoint(client, ep).await {
                record_failure(&mut failures, Operation::Create, ep, e);
            }
        }
        for ep in &changes.update_new {
            if let Err(e) = update_endpoint(client, ep).await {
                record_failure(&mut failures, Operation::Update, ep, e);
            }
        }

        if !failures.is_empty() {
            error!("{} of the requested record changes failed", failures.len());
        }
        failures.into_result()
    }
}

fn record_failure(failures: &mut AggregateError, operation: Operation, ep: &Endpoint, e: Error) {
    error!("Failed to {} record {}: {}", operation, ep.dns_name, e);
    metrics::record_error(operation.as_str());
    failures.push(operation, ep.dns_name.clone(), e);
}

//==============================================================================
// Steps
//==============================================================================

/// Creates one record per target; stops at the first failing target
async fn create_endpoint(client: &dyn DnsClient, ep: &Endpoint) -> Result<()> {
    let zone = find_zone(client, &ep.dns_name).await?;
    create_in_zone(client, &zone, ep).await
}

async fn create_in_zone(client: &dyn DnsClient, zone: &Zone, ep: &Endpoint) -> Result<()> {
    let record_type = ep.record_type.trim().to_ascii_uppercase();
    let ttl = u32::try_from(floor_ttl(ep.record_ttl)).unwrap_or(u32::MAX);
    let comment = labels_comment(ep)?;

    for target in &ep.targets {
        let data = if ep.is_txt() {
            strip_quotes(target)
        } else {
            target.clone()
        };
        let record = NewRecord {
            name: bare_name(&ep.dns_name),
            record_type: record_type.clone(),
            data,
            ttl: Some(ttl),
            comment: comment.clone(),
        };

        let created = client.create_record(&zone.id, &record).await?;
        metrics::record_change("create");
        info!(
            "Created {} record {} -> {} (ID: {})",
            record.record_type, record.name, record.data, created.id
        );
    }
    Ok(())
}

/// Deletes every record of the endpoint's name and type
async fn delete_endpoint(client: &dyn DnsClient, ep: &Endpoint) -> Result<()> {
    let zone = find_zone(client, &ep.dns_name).await?;
    delete_in_zone(client, &zone, ep).await
}

async fn delete_in_zone(client: &dyn DnsClient, zone: &Zone, ep: &Endpoint) -> Result<()> {
    let wanted = canonical_name(&ep.dns_name);
    let records = all_records(client, &zone.id)
        .await
        .map_err(|e| e.context(format!("domain {}", zone.name)))?;

    let matching: Vec<_> = records
        .iter()
        .filter(|r| {
            r.record_type.eq_ignore_ascii_case(ep.record_type.trim())
                && record_fqdn(&r.name, &zone.name) == wanted
        })
        .collect();
    if matching.is_empty() {
        debug!("No {} records named {} to delete", ep.record_type, wanted);
        return Ok(());
    }

    let mut errors = Vec::new();
    for record in matching {
        match client.delete_record(&zone.id, &record.id).await {
            Ok(()) => {
                metrics::record_change("delete");
                info!(
                    "Deleted {} record {} (ID: {})",
                    record.record_type, record.name, record.id
                );
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::provider(
            format!("errors deleting {}", wanted),
            errors.join("; "),
        ))
    }
}

/// Replaces the endpoint's records: delete (non-fatal), then create
async fn update_endpoint(client: &dyn DnsClient, ep: &Endpoint) -> Result<()> {
    let zone = find_zone(client, &ep.dns_name).await?;
    if let Err(e) = delete_in_zone(client, &zone, ep).await {
        warn!(
            "Failed to delete existing record during update of {}: {}",
            ep.dns_name, e
        );
    }
    create_in_zone(client, &zone, ep).await
}
