//! In-memory view of the zone's A records, rebuilt on every tick.

use crate::{
    dns::DnsProvider,
    error::ApiError,
};
use std::{
    collections::HashMap,
    net::Ipv4Addr,
};

/// Hostname -> IP snapshot of the zone's A records.
///
/// The provider is the source of truth, this is only used to decide whether a record needs a
/// closer look. Besides the snapshot it keeps the switches a dry run pretended to make, so the
/// same "would switch" is not announced on every tick.
#[derive(Debug, Default)]
pub struct DnsStateCache {
    snapshot: HashMap<String, Ipv4Addr>,
    assumed: HashMap<String, Ipv4Addr>,
    fresh: bool,
}

impl DnsStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with the provider's current A records.
    ///
    /// On failure the previous snapshot is kept (possibly empty) and marked stale.
    pub async fn refresh(&mut self, provider: &dyn DnsProvider) -> Result<(), ApiError> {
        let records = match provider.list_records().await {
            Ok(records) => records,
            Err(err) => {
                self.fresh = false;
                return Err(err);
            }
        };

        let mut snapshot = HashMap::new();
        for record in records.into_iter().filter(|it| it.is_a_record()) {
            match record.content.parse::<Ipv4Addr>() {
                // last one wins on duplicate names
                Ok(ip) => {
                    snapshot.insert(record.name, ip);
                }
                Err(_) => warn!(name = %record.name, content = %record.content, "A record with invalid content"),
            }
        }

        self.assumed.retain(|hostname, ip| snapshot.get(hostname) != Some(&*ip));
        self.snapshot = snapshot;
        self.fresh = true;

        Ok(())
    }

    /// Current IP of `hostname`, a dry-run assumption taking precedence over the snapshot.
    pub fn get(&self, hostname: &str) -> Option<Ipv4Addr> {
        self.assumed
            .get(hostname)
            .or_else(|| self.snapshot.get(hostname))
            .copied()
    }

    /// Record a value confirmed by the provider.
    pub fn observe(&mut self, hostname: &str, ip: Ipv4Addr) {
        self.assumed.remove(hostname);
        self.snapshot.insert(hostname.to_string(), ip);
    }

    /// Record a switch that was decided but not written.
    pub fn assume(&mut self, hostname: &str, ip: Ipv4Addr) {
        self.assumed.insert(hostname.to_string(), ip);
    }

    /// Whether the last refresh succeeded.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}
