//! DNS client abstraction layer
//!
//! This module defines the capability set the reconciliation code needs from
//! Cloud DNS: paged zone and record listings plus record create and delete.
//! The production implementation lives in [`crate::clouddns`]; tests supply
//! in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

//==============================================================================
// Types
//==============================================================================

/// A provider hosted domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub name: String,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A record as stored by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    /// Record name, normally fully qualified without a trailing dot
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: String,
    /// TTL in seconds; `None` means the provider default
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Record submitted on create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Fully qualified name without a trailing dot
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Opaque continuation of a paged listing
pub type PageToken = String;

/// One page of a finite listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the following page; `None` on the last page
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

// Cloud DNS returns numeric ids; keep them as strings everywhere
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

//==============================================================================
// Trait
//==============================================================================

/// Cloud DNS operations used by the zone resolver and record synchronizer
///
/// Implementations are bound to one authenticated session. Listings are
/// paged: pass `None` for the first page and the returned `next` token for
/// the following ones.
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Lists one page of the zones visible to the session
    async fn list_zones(&self, page: Option<&PageToken>) -> Result<Page<Zone>>;

    /// Lists one page of the records in a zone
    async fn list_records(&self, zone_id: &str, page: Option<&PageToken>) -> Result<Page<Record>>;

    /// Creates a record and returns it as stored
    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<Record>;

    /// Deletes a record by id
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()>;
}

//==============================================================================
// Pagination
//==============================================================================

/// Drains every page of the zone listing
pub async fn all_zones(client: &dyn DnsClient) -> Result<Vec<Zone>> {
    let mut zones = Vec::new();
    let mut token: Option<PageToken> = None;
    loop {
        let page = client.list_zones(token.as_ref()).await?;
        zones.extend(page.items);
        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(zones),
        }
    }
}

/// Drains every page of a zone's record listing
pub async fn all_records(client: &dyn DnsClient, zone_id: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut token: Option<PageToken> = None;
    loop {
        let page = client.list_records(zone_id, token.as_ref()).await?;
        records.extend(page.items);
        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(records),
        }
    }
}

//==============================================================================
// Tests
//==============================================================================
