use crate::{
    cache::DnsStateCache,
    config::{
        FailoverConfig,
        MonitoredService,
    },
    dns::DnsProvider,
    dns_check::{
        PropagationCheck,
        PropagationSender,
    },
    health::{
        HealthOracle,
        HealthVerdict,
    },
    mutator::{
        DnsMutator,
        SwitchOutcome,
    },
};
use chrono::prelude::*;
use futures::StreamExt as _;
use serde::Serialize;
use std::{
    fmt,
    net::Ipv4Addr,
    sync::Arc,
};
use tokio::sync::mpsc::error::TrySendError;

/// What happened to one DNS entry during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryOutcome {
    /// The cached IP already matched the target, the provider was not asked.
    InSync,
    /// The entry looked wrong and was handed to the mutator.
    Mutated(SwitchOutcome),
}

/// Per-service summary, one log line per service and tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceAction {
    NoOp,
    Switched,
    SkippedDryRun,
    SkippedUnknown,
    NotFound,
    Failed,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceAction::NoOp => "no-op",
            ServiceAction::Switched => "switched",
            ServiceAction::SkippedDryRun => "skipped-dry-run",
            ServiceAction::SkippedUnknown => "skipped-unknown",
            ServiceAction::NotFound => "not-found",
            ServiceAction::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl ServiceAction {
    fn summarize(entries: &[EntryReport]) -> Self {
        let has = |outcome| {
            entries
                .iter()
                .any(|entry| entry.outcome == EntryOutcome::Mutated(outcome))
        };
        if has(SwitchOutcome::Failed) {
            ServiceAction::Failed
        } else if has(SwitchOutcome::Switched) {
            ServiceAction::Switched
        } else if has(SwitchOutcome::DryRun) {
            ServiceAction::SkippedDryRun
        } else if has(SwitchOutcome::NotFound) {
            ServiceAction::NotFound
        } else {
            ServiceAction::NoOp
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub hostname: String,
    pub target: Ipv4Addr,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub monitor_id: String,
    pub verdict: HealthVerdict,
    pub action: ServiceAction,
    pub entries: Vec<EntryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    /// False if the zone could not be listed and comparisons used the previous snapshot.
    pub fresh_snapshot: bool,
    pub services: Vec<ServiceReport>,
}

impl TickReport {
    pub fn count(&self, outcome: SwitchOutcome) -> usize {
        self.services
            .iter()
            .flat_map(|service| &service.entries)
            .filter(|entry| entry.outcome == EntryOutcome::Mutated(outcome))
            .count()
    }

    pub fn service(&self, monitor_id: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|it| it.monitor_id == monitor_id)
    }
}

/// Drives DNS records towards the state implied by the health verdicts.
///
/// Owns the DNS state cache. `reconcile` takes `&mut self`, so two ticks can never run
/// against the same zone at the same time.
pub struct Reconciler {
    config: FailoverConfig,
    oracle: Arc<dyn HealthOracle>,
    provider: Arc<dyn DnsProvider>,
    mutator: DnsMutator,
    cache: DnsStateCache,
    propagation: Option<PropagationSender>,
}

impl Reconciler {
    pub fn new(config: FailoverConfig, oracle: Arc<dyn HealthOracle>, provider: Arc<dyn DnsProvider>) -> Self {
        let mutator = DnsMutator::new(provider.clone(), config.dry_run);
        Self {
            config,
            oracle,
            provider,
            mutator,
            cache: DnsStateCache::new(),
            propagation: None,
        }
    }

    /// Report every successful switch to a propagation watcher.
    pub fn with_propagation_watch(mut self, sender: PropagationSender) -> Self {
        self.propagation = Some(sender);
        self
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn cache(&self) -> &DnsStateCache {
        &self.cache
    }

    /// One full reconciliation pass.
    #[instrument(level = "debug", skip_all)]
    pub async fn reconcile(&mut self) -> TickReport {
        let started_at = Utc::now();

        match self.cache.refresh(self.provider.as_ref()).await {
            Ok(()) => debug!(records = self.cache.len(), "Refreshed DNS state"),
            Err(err) => warn!(
                cached = self.cache.len(),
                "Error fetching DNS state, comparing against previous snapshot: {err}"
            ),
        }

        // Verdicts touch no shared state, fetch them concurrently. Order is preserved.
        let oracle = &self.oracle;
        let verdicts = futures::stream::iter(&self.config.services)
            .map(|service| oracle.check_status(&service.monitor_id))
            .buffered(self.config.max_concurrent_checks.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut services = Vec::with_capacity(self.config.services.len());
        for (service, verdict) in self.config.services.iter().zip(verdicts) {
            let report = reconcile_service(
                service,
                verdict,
                self.config.backup_ip,
                &self.mutator,
                &mut self.cache,
                self.propagation.as_ref(),
            )
            .await;
            services.push(report);
        }

        let report = TickReport {
            started_at,
            fresh_snapshot: self.cache.is_fresh(),
            services,
        };

        info!(
            services = report.services.len(),
            switched = report.count(SwitchOutcome::Switched),
            dry_run = report.count(SwitchOutcome::DryRun),
            failed = report.count(SwitchOutcome::Failed),
            fresh_snapshot = report.fresh_snapshot,
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "Reconciliation pass finished"
        );

        report
    }
}

async fn reconcile_service(
    service: &MonitoredService,
    verdict: HealthVerdict,
    backup_ip: Ipv4Addr,
    mutator: &DnsMutator,
    cache: &mut DnsStateCache,
    propagation: Option<&PropagationSender>,
) -> ServiceReport {
    let monitor_id = service.monitor_id.as_str();

    let target = match verdict {
        HealthVerdict::Up => service.primary_ip,
        HealthVerdict::Down => backup_ip,
        HealthVerdict::Unknown => {
            info!(
                monitor_id,
                %verdict,
                action = %ServiceAction::SkippedUnknown,
                "Monitor status unavailable, skipping DNS switching"
            );
            return ServiceReport {
                monitor_id: monitor_id.to_string(),
                verdict,
                action: ServiceAction::SkippedUnknown,
                entries: Vec::new(),
            };
        }
    };

    let mut entries = Vec::with_capacity(service.dns_entries.len());

    for hostname in service.dns_entries.iter().map(String::as_str) {
        let current = match cache.get(hostname) {
            Some(ip) => ip,
            None => {
                if cache.is_fresh() {
                    warn!(monitor_id, hostname, "No A record in zone snapshot, assuming primary ip");
                }
                service.primary_ip
            }
        };

        let outcome = if current == target {
            trace!(monitor_id, hostname, %target, "Already pointed to the correct IP");
            EntryOutcome::InSync
        } else {
            debug!(monitor_id, hostname, %verdict, %current, %target, "Switching DNS");
            let outcome = mutator.switch_to(cache, hostname, target).await;
            if outcome == SwitchOutcome::Switched {
                watch_propagation(propagation, hostname, target);
            }
            EntryOutcome::Mutated(outcome)
        };

        entries.push(EntryReport {
            hostname: hostname.to_string(),
            target,
            outcome,
        });
    }

    let action = ServiceAction::summarize(&entries);
    info!(monitor_id, %verdict, %action, %target, "Service reconciled");

    ServiceReport {
        monitor_id: monitor_id.to_string(),
        verdict,
        action,
        entries,
    }
}

fn watch_propagation(propagation: Option<&PropagationSender>, hostname: &str, ip: Ipv4Addr) {
    let Some(sender) = propagation else {
        return;
    };
    let check = PropagationCheck {
        hostname: hostname.to_string(),
        ip,
    };
    match sender.try_send(check) {
        Ok(()) => {}
        Err(TrySendError::Full(check)) => warn!(hostname = %check.hostname, "Propagation watch busy, not following"),
        Err(TrySendError::Closed(_)) => debug!("Propagation watch stopped"),
    }
}
