pub mod uptimerobot;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// What the upstream monitor says about a service.
///
/// `Unknown` covers everything that is not a clear answer (network failure, timeout,
/// malformed or empty response). It means "hold the current state" and is never folded
/// into `Up` or `Down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Up,
    Down,
    Unknown,
}

impl fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthVerdict::Up => write!(f, "up"),
            HealthVerdict::Down => write!(f, "down"),
            HealthVerdict::Unknown => write!(f, "unknown"),
        }
    }
}

/// Source of up/down verdicts for monitors.
///
/// Implementations never fail: any problem is logged and reported as
/// [`HealthVerdict::Unknown`]. There are no retries, the next tick is the retry.
#[async_trait]
pub trait HealthOracle: Send + Sync {
    async fn check_status(&self, monitor_id: &str) -> HealthVerdict;
}
