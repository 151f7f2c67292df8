use eyre::{
    bail,
    Result,
};
use rsdns::{
    clients::{
        tokio::Client,
        ClientConfig,
    },
    records::{
        data::A,
        Class,
    },
};
use std::{
    net::{
        Ipv4Addr,
        SocketAddr,
    },
    time::Duration,
};
use tokio::time::{
    sleep,
    timeout,
    Instant,
};

pub const CLOUDFLARE_NAMESERVER: &str = "1.1.1.1:53";

/// Poll `nameserver` until `domain` resolves to `ip`. Gives up after `max_wait`.
pub async fn wait_for_dns_record(
    nameserver: SocketAddr,
    domain: &str,
    ip: Ipv4Addr,
    max_wait: Duration,
    step: Duration,
) -> Result<Duration> {
    debug!(?domain, ?ip, "Waiting for DNS record to propagate...");
    let start = Instant::now();

    loop {
        if start.elapsed() > max_wait {
            // it can take a while...
            bail!("DNS record propagation timeout after {}", humantime::format_duration(max_wait));
        }

        if check_dns_record(nameserver, domain, ip, step).await? {
            return Ok(start.elapsed());
        }

        trace!(?domain, "DNS record not propagated yet");
        sleep(step).await;
    }
}

pub async fn check_dns_record(
    nameserver: SocketAddr,
    domain: &str,
    ip: Ipv4Addr,
    query_timeout: Duration,
) -> Result<bool> {
    match timeout(query_timeout, get_a_records(nameserver, domain)).await {
        Ok(Ok(ips)) => Ok(ips.contains(&ip)),
        Ok(Err(e)) => {
            trace!("Failed to resolve DNS record {domain:?}: {e}");
            Ok(false)
        }
        Err(_) => {
            trace!("DNS query for {domain:?} timed out");
            Ok(false)
        }
    }
}

pub async fn get_a_records(nameserver: SocketAddr, qname: &str) -> Result<Vec<Ipv4Addr>> {
    let config = ClientConfig::with_nameserver(nameserver);
    let mut client = Client::new(config).await?;
    let rrset = client.query_rrset::<A>(qname, Class::IN).await?;
    Ok(rrset.rdata.into_iter().map(|a| a.address).collect())
}
