//! Zone resolution
//!
//! Maps a DNS name to the Cloud DNS domain that hosts it by label-aware
//! longest-suffix matching over the full (paged) zone listing.

use tracing::debug;

use crate::dns_client::{all_zones, DnsClient, Zone};
use crate::error::{Error, Result};

/// Finds the most specific zone containing `dns_name`
///
/// Fails with [`Error::InvalidInput`] for an empty name (before any network
/// call) and [`Error::NotFound`] when no zone matches.
pub async fn find_zone(client: &dyn DnsClient, dns_name: &str) -> Result<Zone> {
    let query = normalize(dns_name);
    if query.is_empty() {
        return Err(Error::invalid_input("DNS name cannot be empty"));
    }

    let zones = all_zones(client)
        .await
        .map_err(|e| e.context("failed to list domains"))?;
    debug!("Resolving {} against {} domains", query, zones.len());

    best_match(&query, &zones)
        .cloned()
        .ok_or_else(|| Error::not_found(query))
}

/// Longest zone that equals `name` or is a label suffix of it; ties go to
/// the first zone listed
pub fn best_match<'a>(name: &str, zones: &'a [Zone]) -> Option<&'a Zone> {
    let name = normalize(name);
    let mut best: Option<(&Zone, usize)> = None;
    for zone in zones {
        let zone_name = normalize(&zone.name);
        if zone_name.is_empty() || !in_zone(&name, &zone_name) {
            continue;
        }
        if best.map_or(true, |(_, len)| zone_name.len() > len) {
            best = Some((zone, zone_name.len()));
        }
    }
    best.map(|(zone, _)| zone)
}

/// Whether `name` equals `zone` or sits below it on a label boundary
pub fn in_zone(name: &str, zone: &str) -> bool {
    name == zone
        || name
            .strip_suffix(zone)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn normalize(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    name.strip_suffix('.').unwrap_or(&name).to_string()
}
