//! Follows switched records until a public resolver serves the new IP.
//!
//! Purely informational. Reconciliation never waits for or depends on these checks.

use crate::dns::lookup;
use std::{
    net::{
        Ipv4Addr,
        SocketAddr,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};

pub type PropagationSender = mpsc::Sender<PropagationCheck>;
pub type PropagationReceiver = mpsc::Receiver<PropagationCheck>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationCheck {
    pub hostname: String,
    pub ip: Ipv4Addr,
}

#[derive(Debug, Clone, Copy)]
pub struct PropagationSettings {
    pub nameserver: SocketAddr,
    pub max_wait: Duration,
    pub step: Duration,
}

pub fn channel() -> (PropagationSender, PropagationReceiver) {
    mpsc::channel(64)
}

/// Spawns the watcher. It runs until every sender is dropped.
pub fn start_propagation_watch(mut receiver: PropagationReceiver, settings: PropagationSettings) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(PropagationCheck { hostname, ip }) = receiver.recv().await {
            trace!(?hostname, %ip, nameserver = %settings.nameserver, "Request to watch DNS propagation");
            tokio::spawn(async move {
                match lookup::wait_for_dns_record(settings.nameserver, &hostname, ip, settings.max_wait, settings.step)
                    .await
                {
                    Ok(elapsed) => info!(
                        ?hostname,
                        %ip,
                        "DNS record propagated after {}",
                        humantime::format_duration(Duration::from_secs(elapsed.as_secs()))
                    ),
                    Err(err) => warn!(?hostname, %ip, "DNS record not visible at {}: {err}", settings.nameserver),
                }
            });
        }
        debug!("propagation watch stopped");
    })
}
