#[macro_use]
extern crate tracing;

use clap::Parser;
use dns_failover::{
    config::FailoverConfig,
    dns::{
        cloudflare::{
            CloudflareApi,
            DnsRecordInfo,
            Zone,
        },
        lookup::CLOUDFLARE_NAMESERVER,
        RECORD_TYPE_A,
    },
    dns_check::{
        self,
        PropagationSettings,
    },
    error::ConfigError,
    health::uptimerobot::UptimeRobotApi,
    reconcile::Reconciler,
    scheduler,
};
use eyre::Result;
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
enum Args {
    /// Reconcile on every interval until interrupted.
    Run(ArgsRun),
    /// Run a single reconciliation pass and print the report as json.
    Once(ArgsRun),
    /// List the zones the cloudflare token can access.
    ListZones(ArgsCloudflare),
    /// List the A records of a zone.
    ListRecords(ArgsListRecords),
}

#[derive(Parser)]
struct ArgsRun {
    #[clap(short, long, env = "FAILOVER_CONFIG", help = "Path to the failover config (yaml)")]
    config: PathBuf,

    #[clap(long, env = "CLOUDFLARE_API_TOKEN", help = "Cloudflare API token")]
    cloudflare_api_token: String,

    #[clap(long, env = "UPTIMEROBOT_API_KEY", help = "UptimeRobot API key")]
    uptimerobot_api_key: String,

    #[clap(long, help = "Log switches instead of writing them, overrides the config")]
    dry_run: bool,

    #[clap(
        long = "dns-check",
        env = "CHECK_DNS_PROPAGATION",
        help = "After a switch, query this nameserver until it serves the new IP. If not set, the check is disabled",
        num_args = 0..=1,
        default_missing_value = CLOUDFLARE_NAMESERVER
    )]
    dns_check: Option<SocketAddr>,

    #[clap(
        long,
        env = "DNS_CHECK_MAX_WAIT",
        help = "How long to follow a switched record",
        default_value = "10m",
        value_parser = humantime::parse_duration
    )]
    dns_check_max_wait: Duration,
}

#[derive(Parser)]
struct ArgsCloudflare {
    #[clap(long, env = "CLOUDFLARE_API_TOKEN", help = "Cloudflare API token")]
    cloudflare_api_token: String,
}

#[derive(Parser)]
struct ArgsListRecords {
    #[clap(long, env = "CLOUDFLARE_API_TOKEN", help = "Cloudflare API token")]
    cloudflare_api_token: String,

    #[clap(long = "zone-id", env = "CLOUDFLARE_ZONE_ID", help = "Cloudflare zone id")]
    zone_identifier: String,
}

const CLI_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Args::parse() {
        Args::Run(args) => {
            let mut reconciler = build_reconciler(args).await?;
            let interval = reconciler.config().interval;
            scheduler::run(&mut reconciler, interval, scheduler::shutdown_signal()).await;
        }
        Args::Once(args) => {
            let mut reconciler = build_reconciler(args).await?;
            let report = reconciler.reconcile().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Args::ListZones(ArgsCloudflare { cloudflare_api_token }) => {
            let cloudflare_api = CloudflareApi::new(cloudflare_api_token, CLI_TIMEOUT)?;
            for zone in cloudflare_api.list_zones().await? {
                println!("name={} id={} status={}", zone.name, zone.id, zone.status);
            }
        }
        Args::ListRecords(ArgsListRecords {
            cloudflare_api_token,
            zone_identifier,
        }) => {
            let cloudflare_api = CloudflareApi::new(cloudflare_api_token, CLI_TIMEOUT)?;
            let records = cloudflare_api.list_dns_records(zone_identifier).await?;
            for record in records.into_iter().filter(|it| it.record_type == RECORD_TYPE_A) {
                let DnsRecordInfo { id, name, content, .. } = record;
                println!("name={name} content={content} id={id}");
            }
        }
    }

    Ok(())
}

/// Everything that can fail here is a startup failure and ends the process.
async fn build_reconciler(
    ArgsRun {
        config,
        cloudflare_api_token,
        uptimerobot_api_key,
        dry_run,
        dns_check,
        dns_check_max_wait,
    }: ArgsRun,
) -> Result<Reconciler> {
    let mut config = FailoverConfig::load(&config)?;
    config.dry_run |= dry_run;

    if cloudflare_api_token.trim().is_empty() {
        eyre::bail!("missing cloudflare api token");
    }
    if uptimerobot_api_key.trim().is_empty() {
        eyre::bail!("missing uptimerobot api key");
    }

    let cloudflare_api = CloudflareApi::new(cloudflare_api_token, config.request_timeout)?;
    let zone: Zone = config.zone.clone().into();
    let zone_id = zone
        .clone()
        .lookup_id(&cloudflare_api)
        .await?
        .ok_or_else(|| ConfigError::ZoneNotFound(format!("{zone:?}")))?;

    let provider = Arc::new(cloudflare_api.for_zone(zone_id));

    info!(
        zone_id = provider.zone_id(),
        services = config.services.len(),
        dry_run = config.dry_run,
        "Failover system initialized"
    );

    let oracle = Arc::new(UptimeRobotApi::new(uptimerobot_api_key, config.request_timeout)?);

    let mut reconciler = Reconciler::new(config, oracle, provider);

    if let Some(nameserver) = dns_check {
        let (tx, rx) = dns_check::channel();
        dns_check::start_propagation_watch(
            rx,
            PropagationSettings {
                nameserver,
                max_wait: dns_check_max_wait,
                step: Duration::from_secs(5),
            },
        );
        reconciler = reconciler.with_propagation_watch(tx);
    }

    Ok(reconciler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn list_records_takes_zone_id_flag() {
        let args = Args::try_parse_from([
            "dns-failover",
            "list-records",
            "--cloudflare-api-token",
            "token",
            "--zone-id",
            "ee57d0e2",
        ])
        .unwrap();
        assert!(matches!(args, Args::ListRecords(ArgsListRecords { zone_identifier, .. }) if zone_identifier == "ee57d0e2"));

        let positional = Args::try_parse_from([
            "dns-failover",
            "list-records",
            "--cloudflare-api-token",
            "token",
            "ee57d0e2",
        ]);
        assert!(positional.is_err());
    }
}
