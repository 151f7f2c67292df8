//! In-memory stand-ins for cloudflare and UptimeRobot.

#![allow(dead_code)]

use async_trait::async_trait;
use dns_failover::{
    config::{
        FailoverConfig,
        MonitoredService,
        ZoneConfig,
    },
    dns::{
        DnsProvider,
        DnsRecord,
    },
    error::ApiError,
    health::{
        HealthOracle,
        HealthVerdict,
    },
    reconcile::Reconciler,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    net::Ipv4Addr,
    sync::{
        Arc,
        Mutex,
    },
};

pub const PRIMARY: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const BACKUP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 9);

// --- FakeZone ---

/// A zone whose records live in memory. Counts every call and can be told to fail.
#[derive(Default)]
pub struct FakeZone {
    records: Mutex<Vec<DnsRecord>>,
    fail_list: Mutex<bool>,
    fail_lookup: Mutex<HashSet<String>>,
    fail_update: Mutex<HashSet<String>>,
    lookups: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, String)>>,
}

impl FakeZone {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_a(&self, name: &str, ip: Ipv4Addr) {
        self.add(name, "A", &ip.to_string());
    }

    pub fn add(&self, name: &str, record_type: &str, content: &str) {
        let mut records = self.records.lock().unwrap();
        let id = format!("record-{}", records.len());
        records.push(DnsRecord {
            id,
            name: name.to_string(),
            record_type: record_type.to_string(),
            content: content.to_string(),
        });
    }

    pub fn content(&self, name: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|it| it.name == name && it.is_a_record())
            .map(|it| it.content.clone())
    }

    pub fn set_fail_list(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }

    pub fn fail_lookup_of(&self, name: &str) {
        self.fail_lookup.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_update_of(&self, name: &str) {
        self.fail_update.lock().unwrap().insert(name.to_string());
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    /// `(name, new content)` for every update that reached the provider.
    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }
}

fn timeout(endpoint: &str) -> ApiError {
    ApiError::Timeout {
        endpoint: endpoint.to_string(),
    }
}

#[async_trait]
impl DnsProvider for FakeZone {
    async fn list_records(&self) -> Result<Vec<DnsRecord>, ApiError> {
        if *self.fail_list.lock().unwrap() {
            return Err(timeout("list"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>, ApiError> {
        self.lookups.lock().unwrap().push(name.to_string());
        if self.fail_lookup.lock().unwrap().contains(name) {
            return Err(timeout("lookup"));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|it| it.name == name && it.is_a_record())
            .cloned())
    }

    async fn update_content(&self, record: &DnsRecord, content: &str) -> Result<(), ApiError> {
        if self.fail_update.lock().unwrap().contains(&record.name) {
            return Err(ApiError::Status {
                endpoint: "update".to_string(),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "{}".to_string(),
            });
        }
        let mut records = self.records.lock().unwrap();
        let Some(existing) = records.iter_mut().find(|it| it.id == record.id) else {
            return Err(ApiError::Status {
                endpoint: "update".to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
                body: "{}".to_string(),
            });
        };
        existing.content = content.to_string();
        self.updates
            .lock()
            .unwrap()
            .push((record.name.clone(), content.to_string()));
        Ok(())
    }
}

// --- FakeOracle ---

/// Answers with whatever verdict was last set for a monitor, `Unknown` if none.
#[derive(Default)]
pub struct FakeOracle {
    verdicts: Mutex<HashMap<String, HealthVerdict>>,
    calls: Mutex<Vec<String>>,
}

impl FakeOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, monitor_id: &str, verdict: HealthVerdict) {
        self.verdicts
            .lock()
            .unwrap()
            .insert(monitor_id.to_string(), verdict);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthOracle for FakeOracle {
    async fn check_status(&self, monitor_id: &str) -> HealthVerdict {
        self.calls.lock().unwrap().push(monitor_id.to_string());
        self.verdicts
            .lock()
            .unwrap()
            .get(monitor_id)
            .copied()
            .unwrap_or(HealthVerdict::Unknown)
    }
}

// --- builders ---

pub fn service(monitor_id: &str, entries: &[&str]) -> MonitoredService {
    MonitoredService::new(monitor_id, PRIMARY, entries)
}

pub fn config(services: Vec<MonitoredService>) -> FailoverConfig {
    let config = FailoverConfig::new(ZoneConfig::Id("zone".to_string()), BACKUP, services);
    config.validate().expect("valid test config");
    config
}

pub fn reconciler(config: FailoverConfig, oracle: &Arc<FakeOracle>, zone: &Arc<FakeZone>) -> Reconciler {
    Reconciler::new(config, oracle.clone(), zone.clone())
}
