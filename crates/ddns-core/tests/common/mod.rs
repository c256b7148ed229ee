//! Test doubles and common utilities for contract tests
//!
//! The mock provider keeps records in memory and logs every call so tests
//! can assert on exactly what the engine asked for.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{Policy, ProviderConfig, ZoneMap};
use ddns_core::error::{Error, Result};
use ddns_core::scheduler::ScheduledJob;
use ddns_core::state::{JsonLinesLogStore, JsonStatsStore};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, IpSource, LogLevel, ProviderRecord};
use ddns_core::ActivityLog;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One provider call, as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get { zone: String, name: String },
    Create { zone: String, name: String, ip: Ipv4Addr },
    Update { zone: String, record_id: String, ip: Ipv4Addr },
    Delete { zone: String, record_id: String },
    List { zone: String },
}

/// In-memory DnsProvider that tracks calls
pub struct MockDnsProvider {
    name: &'static str,
    /// (zone, record name) -> record
    records: Arc<Mutex<HashMap<(String, String), ProviderRecord>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    /// Names whose calls fail with a provider error
    failing: Arc<Mutex<HashSet<String>>>,
    /// Zones whose list call fails
    failing_zones: Arc<Mutex<HashSet<String>>>,
    update_call_count: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
}

impl MockDnsProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            records: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            failing_zones: Arc::new(Mutex::new(HashSet::new())),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Create a new MockDnsProvider that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            name: other.name,
            records: Arc::clone(&other.records),
            calls: Arc::clone(&other.calls),
            failing: Arc::clone(&other.failing),
            failing_zones: Arc::clone(&other.failing_zones),
            update_call_count: Arc::clone(&other.update_call_count),
            next_id: Arc::clone(&other.next_id),
        }
    }

    /// Seed an existing record; returns its id
    pub fn seed(&self, zone: &str, name: &str, ip: &str) -> String {
        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = ProviderRecord {
            id: id.clone(),
            name: name.to_string(),
            content: ip.to_string(),
            ttl: 300,
            proxied: false,
            zone_id: zone.to_string(),
        };
        self.records
            .lock()
            .unwrap()
            .insert((zone.to_string(), name.to_string()), record);
        id
    }

    /// Make every call touching `name` fail
    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Make listing `zone` fail
    pub fn fail_listing(&self, zone: &str) {
        self.failing_zones.lock().unwrap().insert(zone.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn record(&self, zone: &str, name: &str) -> Option<ProviderRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(name) {
            return Err(Error::provider(self.name, format!("HTTP 500 for {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn get_record(&self, zone_id: &str, name: &str) -> Result<Option<ProviderRecord>> {
        self.log(Call::Get {
            zone: zone_id.to_string(),
            name: name.to_string(),
        });
        self.check(name)?;
        Ok(self.record(zone_id, name))
    }

    async fn create_record(&self, zone_id: &str, name: &str, ip: Ipv4Addr) -> Result<ProviderRecord> {
        self.log(Call::Create {
            zone: zone_id.to_string(),
            name: name.to_string(),
            ip,
        });
        self.check(name)?;
        self.seed(zone_id, name, &ip.to_string());
        self.record(zone_id, name)
            .ok_or_else(|| Error::provider(self.name, "record vanished"))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record: &ProviderRecord,
        new_ip: Ipv4Addr,
    ) -> Result<ProviderRecord> {
        self.log(Call::Update {
            zone: zone_id.to_string(),
            record_id: record.id.clone(),
            ip: new_ip,
        });
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.check(&record.name)?;
        let mut records = self.records.lock().unwrap();
        let stored = records
            .get_mut(&(zone_id.to_string(), record.name.clone()))
            .ok_or_else(|| Error::provider(self.name, "HTTP 404"))?;
        stored.content = new_ip.to_string();
        Ok(stored.clone())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.log(Call::Delete {
            zone: zone_id.to_string(),
            record_id: record_id.to_string(),
        });
        self.records
            .lock()
            .unwrap()
            .retain(|(zone, _), r| !(zone == zone_id && r.id == record_id));
        Ok(())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ProviderRecord>> {
        self.log(Call::List {
            zone: zone_id.to_string(),
        });
        if self.failing_zones.lock().unwrap().contains(zone_id) {
            return Err(Error::provider(self.name, format!("HTTP 403 for zone {}", zone_id)));
        }
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((zone, _), _)| zone == zone_id)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// Factory handing out views of one shared mock provider
pub struct MockProviderFactory {
    provider: Arc<MockDnsProvider>,
    created: Arc<AtomicUsize>,
}

impl MockProviderFactory {
    pub fn new(provider: &MockDnsProvider) -> Self {
        Self {
            provider: Arc::new(MockDnsProvider::sharing_counters_with(provider)),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.provider.clone())
    }
}

/// IpSource returning a fixed address
pub struct FixedIpSource {
    ip: Ipv4Addr,
    calls: Arc<AtomicUsize>,
}

impl FixedIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for FixedIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ip)
    }
}

/// IpSource that always fails
pub struct FailingIpSource;

#[async_trait]
impl IpSource for FailingIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        Err(Error::ip_resolution("connection timed out"))
    }
}

/// Scheduled job that counts runs and holds each one for `hold`
pub struct CountingJob {
    pub runs: Arc<AtomicUsize>,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
    hold: Duration,
}

impl CountingJob {
    pub fn new(hold: Duration) -> Self {
        Self {
            runs: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            hold,
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduledJob for CountingJob {
    async fn run(&self) {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory stats store and activity log
pub fn stores() -> (Arc<JsonStatsStore>, Arc<ActivityLog>) {
    let stats = Arc::new(JsonStatsStore::in_memory());
    let activity = Arc::new(ActivityLog::new(Arc::new(JsonLinesLogStore::in_memory())));
    (stats, activity)
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn zones(list: &[(&str, &str)]) -> ZoneMap {
    list.iter().copied().collect()
}

pub fn policies(list: Vec<Policy>) -> HashMap<String, Policy> {
    list.into_iter().map(|p| (p.name.clone(), p)).collect()
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Messages at `level`, oldest first
pub async fn messages(activity: &ActivityLog, level: LogLevel) -> Vec<String> {
    let mut entries = activity.by_level(level, 1000).await.unwrap();
    entries.reverse();
    entries.into_iter().map(|e| e.message).collect()
}

/// Every message, oldest first
pub async fn all_messages(activity: &ActivityLog) -> Vec<String> {
    let mut entries = activity.recent(1000).await.unwrap();
    entries.reverse();
    entries.into_iter().map(|e| e.message).collect()
}
