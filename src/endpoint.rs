//! Wire types shared with external-dns
//!
//! These mirror the JSON shapes of the external-dns webhook contract: the
//! endpoint record, the change-set posted to `/records` and the domain filter
//! returned from negotiation.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

//==============================================================================
// Endpoint
//==============================================================================

/// A provider specific key/value attached to an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    pub name: String,
    pub value: String,
}

/// A DNS record set as exchanged with external-dns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Fully qualified name of the record set
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_name: String,
    /// Record values, in order
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub targets: Vec<String>,
    /// Record type (A, CNAME, TXT, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,
    /// TTL in seconds; `None` or `0` means not configured
    #[serde(
        default,
        rename = "recordTTL",
        skip_serializing_if = "Option::is_none"
    )]
    pub record_ttl: Option<i64>,
    /// Ownership labels maintained by the external-dns TXT registry
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl Endpoint {
    pub fn new(
        dns_name: impl Into<String>,
        record_type: impl Into<String>,
        targets: Vec<String>,
    ) -> Self {
        Self {
            dns_name: dns_name.into(),
            record_type: record_type.into(),
            targets,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.record_ttl = Some(ttl);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn is_txt(&self) -> bool {
        self.record_type.eq_ignore_ascii_case(crate::constants::RECORD_TYPE_TXT)
    }
}

//==============================================================================
// Changes
//==============================================================================

/// Desired-state changes computed by the external-dns planner
///
/// Go serializes these fields with their exported names; the lower-case
/// spellings are accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(
        rename = "Create",
        alias = "create",
        default,
        deserialize_with = "null_as_default"
    )]
    pub create: Vec<Endpoint>,
    /// Previous values of updated records; deletes are name/type based so
    /// these are not consulted
    #[serde(
        rename = "UpdateOld",
        alias = "updateOld",
        default,
        deserialize_with = "null_as_default"
    )]
    pub update_old: Vec<Endpoint>,
    #[serde(
        rename = "UpdateNew",
        alias = "updateNew",
        default,
        deserialize_with = "null_as_default"
    )]
    pub update_new: Vec<Endpoint>,
    #[serde(
        rename = "Delete",
        alias = "delete",
        default,
        deserialize_with = "null_as_default"
    )]
    pub delete: Vec<Endpoint>,
}

// Go marshals nil slices and maps as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update_new.is_empty() && self.delete.is_empty()
    }
}

//==============================================================================
// Domain Filter
//==============================================================================

/// Suffix allow-list (with exclusions) of names this webhook manages
///
/// An empty include list matches every name. Entries are compared
/// case-insensitively and without trailing dots. An entry with a leading dot
/// (`.example.com`) matches subdomains only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, S>(include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_exclusions(include, Vec::<String>::new())
    }

    pub fn with_exclusions<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            include: prepare_filters(include),
            exclude: prepare_filters(exclude),
        }
    }

    /// Whether `name` is managed by this filter
    pub fn matches(&self, name: &str) -> bool {
        let name = trim_name(name);
        let included = self.include.is_empty() || matches_any(&self.include, &name);
        included && !matches_any(&self.exclude, &name)
    }

    /// Whether a zone can contain managed names: either the zone itself
    /// matches, or some include entry lies inside it.
    pub fn matches_zone(&self, zone: &str) -> bool {
        if self.matches(zone) {
            return true;
        }
        let zone = trim_name(zone);
        self.include.iter().any(|filter| {
            let filter = filter.trim_start_matches('.');
            filter.ends_with(&format!(".{}", zone))
        })
    }
}

fn prepare_filters<I, S>(filters: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    filters
        .into_iter()
        .map(|f| trim_name(f.as_ref()))
        .filter(|f| !f.is_empty())
        .collect()
}

fn trim_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn matches_any(filters: &[String], name: &str) -> bool {
    filters.iter().any(|filter| {
        if filter.starts_with('.') {
            name.ends_with(filter.as_str())
        } else {
            name == filter || name.ends_with(&format!(".{}", filter))
        }
    })
}

//==============================================================================
// Tests
//==============================================================================
