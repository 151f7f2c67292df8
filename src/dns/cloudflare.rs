use super::{
    DnsProvider,
    DnsRecord,
    RECORD_TYPE_A,
};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::prelude::*;
use reqwest::{
    Method,
    StatusCode,
};
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::time::Duration;

const API_BASE: &str = "https://api.cloudflare.com/client/v4";
const RECORDS_PER_PAGE: usize = 500;

/// Wraps the cloudflare api response.
#[derive(Debug, Deserialize)]
struct ApiResult<T> {
    #[serde(default)]
    errors: Value,
    result: Option<T>,
    result_info: Option<ApiResultInfo>,
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResultInfo {
    page: usize,
    total_pages: usize,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
// zones

/// A cloudflare zone as returned by the zones endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub name_servers: Vec<String>,
}

/// A cloudflare zone. Either the zone name (such as "example.com") or the cloudflare id of it.
#[derive(Clone, Debug)]
pub enum Zone {
    Identifier(String),
    Name(String),
}

impl Zone {
    pub fn id(id: impl ToString) -> Self {
        Zone::Identifier(id.to_string())
    }

    pub fn name(name: impl ToString) -> Self {
        Zone::Name(name.to_string())
    }

    pub async fn lookup_id(self, api: &CloudflareApi) -> Result<Option<String>, ApiError> {
        match self {
            Zone::Identifier(id) => Ok(Some(id)),
            Zone::Name(name) => {
                debug!(?name, "looking up zone by name");
                let zones = api.list_zones().await?;
                Ok(zones.into_iter().find(|it| it.name == name).map(|it| it.id))
            }
        }
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
// dns records

/// A cloudflare dns record.
///
/// See https://developers.cloudflare.com/api/operations/dns-records-for-a-zone-list-dns-records
#[derive(Debug, Serialize, Deserialize)]
pub struct DnsRecordInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

impl From<DnsRecordInfo> for DnsRecord {
    fn from(info: DnsRecordInfo) -> Self {
        DnsRecord {
            id: info.id,
            name: info.name,
            record_type: info.record_type,
            content: info.content,
        }
    }
}

/// Body for the PATCH endpoint. Anything not serialized here is left as is by cloudflare.
#[derive(Debug, Serialize)]
struct ContentPatch<'a> {
    content: &'a str,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Client for the cloudflare v4 api, authorized with a bearer token.
#[derive(Clone)]
pub struct CloudflareApi {
    client: reqwest::Client,
    api_token: String,
}

impl CloudflareApi {
    pub fn new(api_token: impl ToString, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::from_reqwest(API_BASE, err))?;
        Ok(Self {
            client,
            api_token: api_token.to_string(),
        })
    }

    /// Bind the client to one zone, the unit the failover reconciler operates on.
    pub fn for_zone(self, zone_id: impl ToString) -> CloudflareZone {
        CloudflareZone {
            api: self,
            zone_id: zone_id.to_string(),
        }
    }

    /// List all zones the token can see.
    pub async fn list_zones(&self) -> Result<Vec<ZoneInfo>, ApiError> {
        let url = format!("{API_BASE}/zones");
        self.request::<Vec<ZoneInfo>, ()>(&url, None, Method::GET)
            .await
            .map(|(zones, _)| zones)
    }

    /// List all DNS records in a zone, following pagination.
    pub async fn list_dns_records(&self, zone_identifier: impl AsRef<str>) -> Result<Vec<DnsRecordInfo>, ApiError> {
        let zone_identifier = zone_identifier.as_ref();
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = format!("{API_BASE}/zones/{zone_identifier}/dns_records?per_page={RECORDS_PER_PAGE}&page={page}");
            let (batch, info) = self.request::<Vec<DnsRecordInfo>, ()>(&url, None, Method::GET).await?;
            records.extend(batch);

            match next_page(page, info.as_ref()) {
                Some(next) => page = next,
                None => break,
            }
        }

        trace!(zone = zone_identifier, count = records.len(), "listed dns records");

        Ok(records)
    }

    /// List the A records named `name`.
    pub async fn find_a_records(
        &self,
        zone_identifier: impl AsRef<str>,
        name: &str,
    ) -> Result<Vec<DnsRecordInfo>, ApiError> {
        let zone_identifier = zone_identifier.as_ref();
        let url = format!("{API_BASE}/zones/{zone_identifier}/dns_records");
        let req = self
            .client
            .get(&url)
            .query(&[("name", name), ("type", RECORD_TYPE_A)]);
        self.send::<Vec<DnsRecordInfo>>(&url, req).await.map(|(records, _)| records)
    }

    /// Change only the content of a DNS record.
    pub async fn patch_dns_record_content(
        &self,
        zone_identifier: impl AsRef<str>,
        id: impl AsRef<str>,
        content: &str,
    ) -> Result<DnsRecordInfo, ApiError> {
        let zone_identifier = zone_identifier.as_ref();
        let id = id.as_ref();
        let url = format!("{API_BASE}/zones/{zone_identifier}/dns_records/{id}");
        self.request::<DnsRecordInfo, _>(&url, Some(ContentPatch { content }), Method::PATCH)
            .await
            .map(|(record, _)| record)
    }

    async fn request<R, B>(
        &self,
        url: &str,
        body: Option<B>,
        method: Method,
    ) -> Result<(R, Option<ApiResultInfo>), ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let req = self.client.request(method, url);
        let req = if let Some(body) = body { req.json(&body) } else { req };
        self.send(url, req).await
    }

    async fn send<R>(&self, url: &str, req: reqwest::RequestBuilder) -> Result<(R, Option<ApiResultInfo>), ApiError>
    where
        R: DeserializeOwned,
    {
        let res = req
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(url, err))?;

        let status = res.status();
        let body = res.text().await.map_err(|err| ApiError::from_reqwest(url, err))?;

        decode_response(url, status, &body)
    }
}

/// The page after `page`, as long as the server reports more. The counter is ours, the
/// server's own `page` is never trusted to advance.
fn next_page(page: usize, info: Option<&ApiResultInfo>) -> Option<usize> {
    let info = info?;
    if info.page != page {
        debug!(requested = page, reported = info.page, "cloudflare reported a different page");
    }
    (page < info.total_pages).then_some(page + 1)
}

/// Unwraps the cloudflare envelope.
fn decode_response<R>(url: &str, status: StatusCode, body: &str) -> Result<(R, Option<ApiResultInfo>), ApiError>
where
    R: DeserializeOwned,
{
    if !status.is_success() {
        return Err(ApiError::Status {
            endpoint: url.to_string(),
            status,
            body: body.to_string(),
        });
    }

    let envelope: ApiResult<R> = serde_json::from_str(body).map_err(|err| ApiError::malformed(url, err))?;

    if !envelope.success {
        return Err(ApiError::Rejected {
            endpoint: url.to_string(),
            errors: envelope.errors.to_string(),
        });
    }

    let result = envelope
        .result
        .ok_or_else(|| ApiError::malformed(url, "missing result"))?;

    Ok((result, envelope.result_info))
}

/// A [`CloudflareApi`] bound to a single zone.
#[derive(Clone)]
pub struct CloudflareZone {
    api: CloudflareApi,
    zone_id: String,
}

impl CloudflareZone {
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }
}

#[async_trait]
impl DnsProvider for CloudflareZone {
    async fn list_records(&self) -> Result<Vec<DnsRecord>, ApiError> {
        let records = self.api.list_dns_records(&self.zone_id).await?;
        Ok(records.into_iter().map(DnsRecord::from).collect())
    }

    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>, ApiError> {
        let records = self.api.find_a_records(&self.zone_id, name).await?;
        if records.len() > 1 {
            warn!(name, count = records.len(), "multiple A records found, using the first one");
        }
        Ok(records.into_iter().next().map(DnsRecord::from))
    }

    async fn update_content(&self, record: &DnsRecord, content: &str) -> Result<(), ApiError> {
        let updated = self
            .api
            .patch_dns_record_content(&self.zone_id, &record.id, content)
            .await?;
        debug!(name = %updated.name, content = %updated.content, id = %updated.id, "patched dns record");
        Ok(())
    }
}
