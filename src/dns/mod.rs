pub mod cloudflare;
pub mod lookup;

use crate::error::ApiError;
use async_trait::async_trait;

pub const RECORD_TYPE_A: &str = "A";

/// The parts of a provider-side DNS record the failover logic cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    pub record_type: String,
    pub content: String,
}

impl DnsRecord {
    pub fn is_a_record(&self) -> bool {
        self.record_type == RECORD_TYPE_A
    }
}

/// Access to the records of a single DNS zone.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// All records of the zone, of every type.
    async fn list_records(&self) -> Result<Vec<DnsRecord>, ApiError>;

    /// Point lookup of the A record named `name`, bypassing any cache.
    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>, ApiError>;

    /// Replace the content of `record` and nothing else.
    async fn update_content(&self, record: &DnsRecord, content: &str) -> Result<(), ApiError>;
}
