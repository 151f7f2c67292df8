//! Failover configuration, read once at startup.

use crate::{
    dns::cloudflare::Zone,
    error::ConfigError,
};
use serde::{
    Deserialize,
    Deserializer,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    net::Ipv4Addr,
    path::Path,
    time::Duration,
};

/// Everything the reconciler needs besides credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailoverConfig {
    /// The cloudflare zone holding all managed records.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub zone: ZoneConfig,
    /// Where records point while their service is down.
    pub backup_ip: Ipv4Addr,
    /// Compute and log switches without writing them to cloudflare.
    #[serde(default)]
    pub dry_run: bool,
    /// Time between two reconciliation passes.
    #[serde(default = "default_interval", deserialize_with = "de_duration")]
    pub interval: Duration,
    /// Upper bound for every single API call.
    #[serde(default = "default_request_timeout", deserialize_with = "de_duration")]
    pub request_timeout: Duration,
    /// How many health checks may be in flight at once.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// Monitored services, processed in this order.
    pub services: Vec<MonitoredService>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum ZoneConfig {
    #[serde(rename = "id")]
    Id(String),
    #[serde(rename = "name")]
    Name(String),
}

impl From<ZoneConfig> for Zone {
    fn from(zone: ZoneConfig) -> Self {
        match zone {
            ZoneConfig::Id(id) => Zone::id(id),
            ZoneConfig::Name(name) => Zone::name(name),
        }
    }
}

/// A service watched by one uptime monitor and served by a set of A records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoredService {
    #[serde(deserialize_with = "de_monitor_id")]
    pub monitor_id: String,
    pub primary_ip: Ipv4Addr,
    #[serde(deserialize_with = "de_dns_entries")]
    pub dns_entries: Vec<String>,
}

impl MonitoredService {
    pub fn new(monitor_id: impl ToString, primary_ip: Ipv4Addr, dns_entries: &[&str]) -> Self {
        Self {
            monitor_id: monitor_id.to_string(),
            primary_ip,
            dns_entries: dns_entries.iter().map(|it| normalize_hostname(it)).collect(),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrent_checks() -> usize {
    4
}

fn de_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Monitor ids are numeric in UptimeRobot but opaque to us, accept both spellings.
fn de_monitor_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

fn de_dns_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let entries = Vec::<String>::deserialize(deserializer)?;
    Ok(entries.iter().map(|it| normalize_hostname(it)).collect())
}

/// Spell `hostname` the way cloudflare lists it: lowercase, without the root dot.
pub fn normalize_hostname(hostname: &str) -> String {
    let hostname = hostname.trim();
    hostname.strip_suffix('.').unwrap_or(hostname).to_ascii_lowercase()
}

impl FailoverConfig {
    pub fn new(zone: ZoneConfig, backup_ip: Ipv4Addr, services: Vec<MonitoredService>) -> Self {
        Self {
            zone,
            backup_ip,
            dry_run: false,
            interval: default_interval(),
            request_timeout: default_request_timeout(),
            max_concurrent_checks: default_max_concurrent_checks(),
            services,
        }
    }

    /// Read, parse and validate a yaml config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        debug!(?path, services = config.services.len(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: FailoverConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let mut monitors = HashSet::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for service in &self.services {
            let monitor_id = service.monitor_id.as_str();
            if !monitors.insert(monitor_id) {
                return Err(ConfigError::DuplicateMonitor {
                    monitor_id: monitor_id.to_string(),
                });
            }

            if service.dns_entries.is_empty() {
                return Err(ConfigError::EmptyEntries {
                    monitor_id: monitor_id.to_string(),
                });
            }

            for hostname in &service.dns_entries {
                if !is_qualified_hostname(hostname) {
                    return Err(ConfigError::InvalidHostname {
                        monitor_id: monitor_id.to_string(),
                        hostname: hostname.clone(),
                    });
                }
                // every record belongs to exactly one service
                if let Some(first) = owners.insert(hostname, monitor_id) {
                    return Err(ConfigError::DuplicateEntry {
                        hostname: hostname.clone(),
                        first: first.to_string(),
                        second: monitor_id.to_string(),
                    });
                }
            }

            if service.primary_ip == self.backup_ip {
                warn!(monitor_id, ip = %self.backup_ip, "primary ip equals backup ip, failover has no effect");
            }
        }

        Ok(())
    }

    pub fn service(&self, monitor_id: &str) -> Option<&MonitoredService> {
        self.services.iter().find(|it| it.monitor_id == monitor_id)
    }
}

/// Cloudflare wants `example.com` / `*.example.com`, not the `@` / `*` shorthands.
///
/// Only the normalized spelling is accepted, anything else never matches a listed record.
fn is_qualified_hostname(hostname: &str) -> bool {
    if normalize_hostname(hostname) != hostname {
        return false;
    }
    let name = hostname.strip_prefix("*.").unwrap_or(hostname);
    let labels = name.split('.').collect::<Vec<_>>();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}
