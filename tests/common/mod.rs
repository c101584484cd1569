//! Shared test fixtures: an in-memory Cloud DNS with a call log and
//! injectable failures

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use clouddns_webhook::credentials::{Authenticator, CredentialCache, Session};
use clouddns_webhook::dns_client::{DnsClient, NewRecord, Page, PageToken, Record, Zone};
use clouddns_webhook::endpoint::{DomainFilter, Endpoint};
use clouddns_webhook::error::{Error, Result};
use clouddns_webhook::provider::CloudDnsProvider;

/// A provider call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListZones,
    ListRecords(String),
    Create {
        zone_id: String,
        name: String,
        record_type: String,
        data: String,
        ttl: Option<u32>,
        comment: Option<String>,
    },
    Delete {
        zone_id: String,
        record_id: String,
    },
}

#[derive(Default)]
struct State {
    zones: Vec<Zone>,
    records: HashMap<String, Vec<Record>>,
    calls: Vec<Call>,
    next_id: usize,
    fail_listing: bool,
    fail_create_data: HashSet<String>,
    fail_delete_ids: HashSet<String>,
}

/// In-memory Cloud DNS with paged listings
pub struct FakeDns {
    state: Mutex<State>,
    page_size: usize,
}

impl FakeDns {
    pub fn new(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            page_size,
        })
    }

    pub fn add_zone(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.zones.push(Zone::new(id, name));
        state.records.entry(id.to_string()).or_default();
    }

    pub fn add_record(&self, zone_id: &str, name: &str, record_type: &str, data: &str) -> String {
        self.add_record_with(zone_id, name, record_type, data, Some(3600), None)
    }

    pub fn add_record_with(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
        data: &str,
        ttl: Option<u32>,
        comment: Option<&str>,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state.records.entry(zone_id.to_string()).or_default().push(Record {
            id: id.clone(),
            name: name.to_string(),
            record_type: record_type.to_string(),
            data: data.to_string(),
            ttl,
            comment: comment.map(str::to_string),
        });
        id
    }

    /// Every listing call fails from now on
    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    /// Creates of a record with this data fail
    pub fn fail_create_of(&self, data: &str) {
        self.state.lock().unwrap().fail_create_data.insert(data.to_string());
    }

    /// Deletes of this record id fail
    pub fn fail_delete_of(&self, record_id: &str) {
        self.state.lock().unwrap().fail_delete_ids.insert(record_id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Create and delete calls only
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create { .. } | Call::Delete { .. }))
            .collect()
    }

    pub fn records(&self, zone_id: &str) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    fn page<T: Clone>(&self, items: &[T], page: Option<&PageToken>) -> Page<T> {
        let offset: usize = page.map(|p| p.parse().unwrap()).unwrap_or(0);
        let end = (offset + self.page_size).min(items.len());
        Page {
            items: items[offset..end].to_vec(),
            next: (end < items.len()).then(|| end.to_string()),
        }
    }
}

#[async_trait]
impl DnsClient for FakeDns {
    async fn list_zones(&self, page: Option<&PageToken>) -> Result<Page<Zone>> {
        let zones = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::ListZones);
            if state.fail_listing {
                return Err(Error::provider("GET /domains", "503 Service Unavailable"));
            }
            state.zones.clone()
        };
        Ok(self.page(&zones, page))
    }

    async fn list_records(&self, zone_id: &str, page: Option<&PageToken>) -> Result<Page<Record>> {
        let records = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::ListRecords(zone_id.to_string()));
            if state.fail_listing {
                return Err(Error::provider("GET /records", "503 Service Unavailable"));
            }
            state
                .records
                .get(zone_id)
                .cloned()
                .ok_or_else(|| Error::provider("GET /records", "404 Not Found"))?
        };
        Ok(self.page(&records, page))
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<Record> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create {
            zone_id: zone_id.to_string(),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            data: record.data.clone(),
            ttl: record.ttl,
            comment: record.comment.clone(),
        });
        if state.fail_create_data.contains(&record.data) {
            return Err(Error::provider("POST /records", "400 Bad Request"));
        }
        state.next_id += 1;
        let created = Record {
            id: format!("rec-{}", state.next_id),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            data: record.data.clone(),
            ttl: record.ttl,
            comment: record.comment.clone(),
        };
        state
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
        });
        if state.fail_delete_ids.contains(record_id) {
            return Err(Error::provider("DELETE /records", "500 Internal Server Error"));
        }
        if let Some(records) = state.records.get_mut(zone_id) {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }
}

/// Hands out sessions bound to the same fake, counting authentications
pub struct StaticAuth {
    pub client: Arc<FakeDns>,
    pub calls: Mutex<usize>,
}

#[async_trait]
impl Authenticator for StaticAuth {
    async fn authenticate(&self) -> Result<Session> {
        *self.calls.lock().unwrap() += 1;
        Ok(Session::with_default_lifetime(self.client.clone()))
    }
}

pub fn credentials(fake: &Arc<FakeDns>) -> Arc<CredentialCache> {
    let auth = Arc::new(StaticAuth {
        client: Arc::clone(fake),
        calls: Mutex::new(0),
    });
    let session = Session::with_default_lifetime(fake.clone());
    Arc::new(CredentialCache::from_session(auth, session))
}

pub fn provider(fake: &Arc<FakeDns>, filter: DomainFilter, dry_run: bool) -> CloudDnsProvider {
    CloudDnsProvider::new(credentials(fake), filter, dry_run)
}

/// Two zones, `example.com` (id 1) and `sub.example.com` (id 2)
pub fn fake_with_zones() -> Arc<FakeDns> {
    let fake = FakeDns::new(1);
    fake.add_zone("1", "example.com");
    fake.add_zone("2", "sub.example.com");
    fake
}

pub fn endpoint(name: &str, record_type: &str, targets: &[&str]) -> Endpoint {
    Endpoint::new(
        name,
        record_type,
        targets.iter().map(|t| t.to_string()).collect(),
    )
}
