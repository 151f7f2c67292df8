use crate::{
    cache::DnsStateCache,
    dns::DnsProvider,
};
use serde::Serialize;
use std::{
    net::Ipv4Addr,
    sync::Arc,
};

/// Result of a single [`DnsMutator::switch_to`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchOutcome {
    /// The record was updated at the provider.
    Switched,
    /// The record would have been updated, but mutation is disabled.
    DryRun,
    /// The live record already points to the target.
    AlreadyCurrent,
    /// The zone has no A record with that name.
    NotFound,
    /// Looking up or updating the record failed.
    Failed,
}

/// Points one record at a new IP, idempotently.
pub struct DnsMutator {
    provider: Arc<dyn DnsProvider>,
    dry_run: bool,
}

impl DnsMutator {
    pub fn new(provider: Arc<dyn DnsProvider>, dry_run: bool) -> Self {
        Self { provider, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Switch `hostname` to `target`.
    ///
    /// Always consults the provider for the live record first, the cache may be stale. Errors
    /// are logged and reported as [`SwitchOutcome::Failed`], they never reach the caller.
    #[instrument(level = "debug", skip(self, cache))]
    pub async fn switch_to(&self, cache: &mut DnsStateCache, hostname: &str, target: Ipv4Addr) -> SwitchOutcome {
        let record = match self.provider.find_record(hostname).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(hostname, %target, "DNS record was not found");
                return SwitchOutcome::NotFound;
            }
            Err(err) => {
                error!(hostname, %target, "Error looking up DNS record: {err}");
                return SwitchOutcome::Failed;
            }
        };

        let target_content = target.to_string();

        if record.content == target_content {
            debug!(hostname, %target, "DNS record already points to the target");
            cache.observe(hostname, target);
            return SwitchOutcome::AlreadyCurrent;
        }

        if self.dry_run {
            info!(hostname, from = %record.content, %target, "DNS switch skipped (dry run)");
            cache.assume(hostname, target);
            return SwitchOutcome::DryRun;
        }

        match self.provider.update_content(&record, &target_content).await {
            Ok(()) => {
                info!(hostname, from = %record.content, %target, "Switched DNS record");
                cache.observe(hostname, target);
                SwitchOutcome::Switched
            }
            Err(err) => {
                error!(hostname, %target, record_id = %record.id, "Error switching DNS record: {err}");
                SwitchOutcome::Failed
            }
        }
    }
}
