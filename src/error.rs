use reqwest::StatusCode;
use std::path::PathBuf;

/// Failure talking to one of the external APIs (Cloudflare or UptimeRobot).
///
/// None of these are fatal while reconciling. Callers log them and treat the result as
/// unknown / absent for the current tick.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} responded with status={status}, body={body:?}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("{endpoint} rejected the request: {errors}")]
    Rejected { endpoint: String, errors: String },

    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl ApiError {
    pub fn from_reqwest(endpoint: impl ToString, err: reqwest::Error) -> Self {
        let endpoint = endpoint.to_string();
        if err.is_timeout() {
            ApiError::Timeout { endpoint }
        } else if err.is_decode() {
            ApiError::Malformed {
                endpoint,
                reason: err.to_string(),
            }
        } else {
            ApiError::Transport { endpoint, source: err }
        }
    }

    pub fn malformed(endpoint: impl ToString, reason: impl ToString) -> Self {
        ApiError::Malformed {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The response arrived but could not be understood. Handled exactly like a transient
    /// failure, only reported differently.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ApiError::Malformed { .. })
    }
}

/// Problems with the failover configuration. Only raised at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("no services configured")]
    NoServices,

    #[error("service {monitor_id:?} has no dns entries")]
    EmptyEntries { monitor_id: String },

    #[error("monitor {monitor_id:?} is configured more than once")]
    DuplicateMonitor { monitor_id: String },

    #[error("dns entry {hostname:?} is claimed by both {first:?} and {second:?}")]
    DuplicateEntry {
        hostname: String,
        first: String,
        second: String,
    },

    #[error("service {monitor_id:?} has invalid dns entry {hostname:?}, expected a fully qualified hostname")]
    InvalidHostname { monitor_id: String, hostname: String },

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("zone {0:?} not found")]
    ZoneNotFound(String),
}
