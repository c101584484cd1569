//! Endpoint normalization
//!
//! Canonicalizes records crossing the boundary with external-dns. Inbound
//! endpoints (the `/adjustendpoints` pre-flight) are validated, filtered and
//! given a TTL floor; outbound provider records are turned back into fully
//! qualified endpoints.
//!
//! TXT values are stored in Cloud DNS without quotes. Endpoints returned to
//! external-dns carry exactly one layer of quotes; everything arriving from
//! external-dns is stripped before it is compared or stored.
//!
//! Endpoint labels travel in the record comment as a JSON string map.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::constants::{MAX_COMMENT_LEN, MIN_TTL_SECS, UNMANAGED_RECORD_TYPES};
use crate::dns_client::Record;
use crate::endpoint::{DomainFilter, Endpoint};
use crate::validation::validate_record_name;

//==============================================================================
// Names and values
//==============================================================================

/// Trimmed, lower-cased, with exactly one trailing dot; empty stays empty
pub fn canonical_name(name: &str) -> String {
    let name = bare_name(name);
    if name.is_empty() {
        name
    } else {
        format!("{}.", name)
    }
}

/// Trimmed, lower-cased, without trailing dots
pub fn bare_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Applies the Cloud DNS minimum TTL; unset and zero mean the minimum
pub fn floor_ttl(ttl: Option<i64>) -> i64 {
    match ttl {
        Some(ttl) if ttl > MIN_TTL_SECS => ttl,
        _ => MIN_TTL_SECS,
    }
}

/// Removes every surrounding double quote
pub fn strip_quotes(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Wraps a TXT value in exactly one layer of quotes
pub fn quote_txt(value: &str) -> String {
    format!("\"{}\"", value.trim_matches('"'))
}

pub fn is_unmanaged_type(record_type: &str) -> bool {
    UNMANAGED_RECORD_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(record_type))
}

/// Fully qualified, canonical name of a provider record in `zone`
///
/// Cloud DNS normally returns fully qualified names, but relative names and
/// `@` are accepted as well.
pub fn record_fqdn(record_name: &str, zone: &str) -> String {
    let zone = bare_name(zone);
    let name = bare_name(record_name);
    if name.is_empty() || name == "@" || name == zone {
        return canonical_name(&zone);
    }
    if name.ends_with(&format!(".{}", zone)) {
        canonical_name(&name)
    } else {
        canonical_name(&format!("{}.{}", name, zone))
    }
}

//==============================================================================
// Inbound
//==============================================================================

/// Normalizes endpoints proposed by external-dns
///
/// Entries that cannot be managed are dropped with a warning; this never
/// fails. Applying it twice gives the same result.
pub fn adjust_endpoints(endpoints: Vec<Endpoint>, filter: &DomainFilter) -> Vec<Endpoint> {
    endpoints
        .into_iter()
        .filter_map(|ep| {
            let name = ep.dns_name.clone();
            match adjust_endpoint(ep, filter) {
                Ok(ep) => Some(ep),
                Err(reason) => {
                    warn!("Dropping endpoint '{}': {}", name, reason);
                    None
                }
            }
        })
        .collect()
}

fn adjust_endpoint(mut ep: Endpoint, filter: &DomainFilter) -> Result<Endpoint, String> {
    if ep.dns_name.trim().is_empty() {
        return Err("empty DNS name".to_string());
    }
    if ep.targets.is_empty() {
        return Err("no targets".to_string());
    }
    if is_unmanaged_type(&ep.record_type) {
        return Err(format!("{} records are not managed", ep.record_type));
    }

    ep.dns_name = canonical_name(&ep.dns_name);
    validate_record_name(&ep.dns_name).map_err(|e| e.to_string())?;
    if !filter.matches(&ep.dns_name) {
        return Err("outside the domain filter".to_string());
    }

    ep.record_ttl = Some(floor_ttl(ep.record_ttl));
    ep.record_type = ep.record_type.trim().to_ascii_uppercase();
    if ep.is_txt() {
        ep.targets = ep.targets.iter().map(|t| strip_quotes(t)).collect();
    }
    Ok(ep)
}

//==============================================================================
// Outbound
//==============================================================================

/// Converts a provider record of `zone` into an endpoint
///
/// Returns `None` for record types this webhook does not manage.
pub fn record_to_endpoint(record: &Record, zone: &str) -> Option<Endpoint> {
    if is_unmanaged_type(&record.record_type) {
        return None;
    }

    let record_type = record.record_type.to_ascii_uppercase();
    let mut ep = Endpoint::new(
        record_fqdn(&record.name, zone),
        record_type,
        vec![record.data.clone()],
    )
    .with_ttl(floor_ttl(record.ttl.map(i64::from)));

    if ep.is_txt() {
        ep.targets = vec![quote_txt(&record.data)];
    }
    if let Some(comment) = record.comment.as_deref().map(str::trim) {
        if comment.starts_with('{') {
            match serde_json::from_str::<BTreeMap<String, String>>(comment) {
                Ok(labels) => ep.labels = labels,
                Err(e) => warn!(
                    "Ignoring unparseable labels on {} record {}: {}",
                    ep.record_type, record.name, e
                ),
            }
        } else if !comment.is_empty() {
            debug!("Record {} has a free-text comment, no labels", record.name);
        }
    }
    Some(ep)
}

/// Endpoint labels as a record comment, `None` when there are none
///
/// The longest labels are dropped until the JSON fits in
/// `MAX_COMMENT_LEN` characters.
pub fn labels_comment(ep: &Endpoint) -> serde_json::Result<Option<String>> {
    let mut labels = ep.labels.clone();
    while !labels.is_empty() {
        let comment = serde_json::to_string(&labels)?;
        if comment.chars().count() <= MAX_COMMENT_LEN {
            return Ok(Some(comment));
        }
        let longest = labels
            .iter()
            .max_by(|a, b| {
                (a.0.len() + a.1.len())
                    .cmp(&(b.0.len() + b.1.len()))
                    .then_with(|| b.0.cmp(a.0))
            })
            .map(|(key, _)| key.clone());
        if let Some(key) = longest {
            warn!(
                "Labels of {} exceed {} characters, dropping '{}'",
                ep.dns_name, MAX_COMMENT_LEN, key
            );
            labels.remove(&key);
        }
    }
    Ok(None)
}

//==============================================================================
// Tests
//==============================================================================
