//! Aliyun DNS (Alidns) provider implementation
//!
//! Talks to the Alidns RPC API with signature version 1.0: every request is a
//! GET whose sorted, percent-encoded query string is signed with HMAC-SHA1.
//! API documentation: <https://help.aliyun.com/document_detail/29739.html>

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, trace};
use uuid::Uuid;

use certrelay_config::AliyunConfig;

use super::provider::{DnsProvider, DnsProviderError, DnsRecord, DnsResult, TXT_RECORD_TYPE};

type HmacSha1 = Hmac<Sha1>;

/// Alidns API version
const API_VERSION: &str = "2015-01-09";

/// Records per DescribeDomainRecords page
const PAGE_SIZE: u64 = 100;

/// Error code returned when an update would not change the record
const DUPLICATE_RECORD_CODE: &str = "DomainRecordDuplicate";

/// Aliyun DNS provider
pub struct AliyunDnsProvider {
    client: Client,
    endpoint: String,
    access_key_id: String,
    access_key_secret: String,
    region: String,
    timeout: Duration,
}

impl AliyunDnsProvider {
    /// Create a new Aliyun DNS provider
    ///
    /// # Arguments
    ///
    /// * `config` - Credentials, region and endpoint
    /// * `timeout` - Request timeout
    pub fn new(config: &AliyunConfig, timeout: Duration) -> DnsResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DnsProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone(),
            region: config.region.clone(),
            timeout,
        })
    }

    /// Build the full signed query for an action
    fn signed_query(
        &self,
        action: &str,
        params: &[(&str, &str)],
        timestamp: &str,
        nonce: &str,
    ) -> DnsResult<String> {
        let mut all: Vec<(&str, &str)> = vec![
            ("Action", action),
            ("Format", "JSON"),
            ("Version", API_VERSION),
            ("AccessKeyId", &self.access_key_id),
            ("RegionId", &self.region),
            ("SignatureMethod", "HMAC-SHA1"),
            ("SignatureVersion", "1.0"),
            ("SignatureNonce", nonce),
            ("Timestamp", timestamp),
        ];
        all.extend_from_slice(params);

        let canonical = canonical_query(&all);
        let signature = sign(&self.access_key_secret, &string_to_sign("GET", &canonical))?;

        Ok(format!("{}&Signature={}", canonical, percent_encode(&signature)))
    }

    /// Perform one RPC call and decode the JSON body
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> DnsResult<T> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = Uuid::new_v4().to_string();
        let query = self.signed_query(action, params, &timestamp, &nonce)?;
        let url = format!("{}/?{}", self.endpoint, query);

        trace!(action = %action, "Sending Alidns request");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DnsProviderError::Timeout {
                    elapsed_secs: self.timeout.as_secs(),
                }
            } else {
                DnsProviderError::Network(format!("{} request failed: {}", action, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DnsProviderError::Network(format!("{} response: {}", action, e)))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            DnsProviderError::InvalidResponse(format!("Failed to parse {} response: {}", action, e))
        })
    }
}

impl std::fmt::Debug for AliyunDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunDnsProvider")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish()
    }
}

#[async_trait]
impl DnsProvider for AliyunDnsProvider {
    fn name(&self) -> &'static str {
        "aliyun"
    }

    async fn find_txt_record(
        &self,
        root_domain: &str,
        record_name: &str,
    ) -> DnsResult<Option<DnsRecord>> {
        let page_size = PAGE_SIZE.to_string();
        let mut page_number: u64 = 1;

        // RRKeyWord is a fuzzy match, so "_acme-challenge" also returns "_acme-challenge.api"
        let found = loop {
            let page = page_number.to_string();
            let response: DescribeRecordsResponse = self
                .call(
                    "DescribeDomainRecords",
                    &[
                        ("DomainName", root_domain),
                        ("RRKeyWord", record_name),
                        ("TypeKeyWord", TXT_RECORD_TYPE),
                        ("PageNumber", page.as_str()),
                        ("PageSize", page_size.as_str()),
                    ],
                )
                .await?;

            let returned = response.domain_records.record.len() as u64;
            let found = response.domain_records.record.into_iter().find(|r| {
                r.rr == record_name && r.record_type.eq_ignore_ascii_case(TXT_RECORD_TYPE)
            });

            if found.is_some() || returned == 0 || page_number * PAGE_SIZE >= response.total_count
            {
                break found;
            }

            trace!(page = page_number, total = response.total_count, "Fetching next record page");
            page_number += 1;
        };

        let record = found.map(|r| DnsRecord {
            id: r.record_id,
            name: r.rr,
            record_type: r.record_type,
            value: r.value,
        });

        debug!(
            root_domain = %root_domain,
            record_name = %record_name,
            found = record.is_some(),
            "Queried existing TXT record"
        );

        Ok(record)
    }

    async fn create_txt_record(
        &self,
        root_domain: &str,
        record_name: &str,
        value: &str,
    ) -> DnsResult<String> {
        let response: RecordIdResponse = self
            .call(
                "AddDomainRecord",
                &[
                    ("DomainName", root_domain),
                    ("RR", record_name),
                    ("Type", TXT_RECORD_TYPE),
                    ("Value", value),
                ],
            )
            .await?;

        if response.record_id.is_empty() {
            return Err(DnsProviderError::InvalidResponse(
                "AddDomainRecord response has no RecordId".to_string(),
            ));
        }

        debug!(record_id = %response.record_id, "TXT record created");
        Ok(response.record_id)
    }

    async fn update_txt_record(
        &self,
        record_id: &str,
        record_name: &str,
        value: &str,
    ) -> DnsResult<()> {
        let result: DnsResult<RecordIdResponse> = self
            .call(
                "UpdateDomainRecord",
                &[
                    ("RecordId", record_id),
                    ("RR", record_name),
                    ("Type", TXT_RECORD_TYPE),
                    ("Value", value),
                ],
            )
            .await;

        match result {
            Ok(_) => {
                debug!(record_id = %record_id, "TXT record updated");
                Ok(())
            }
            // The record already holds this value
            Err(DnsProviderError::Api { code, .. }) if code == DUPLICATE_RECORD_CODE => {
                debug!(record_id = %record_id, "TXT record already up to date");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_record(&self, record_id: &str) -> DnsResult<()> {
        let _: RecordIdResponse = self
            .call("DeleteDomainRecord", &[("RecordId", record_id)])
            .await?;

        debug!(record_id = %record_id, "Record deleted");
        Ok(())
    }
}

/// RFC 3986 percent-encoding as required by the signature scheme
fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sort parameters by key and join them as `k=v&k=v`, both sides encoded
fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn string_to_sign(method: &str, canonical: &str) -> String {
    format!("{}&{}&{}", method, percent_encode("/"), percent_encode(canonical))
}

/// Base64 HMAC-SHA1 keyed with `<secret>&`
fn sign(secret: &str, string_to_sign: &str) -> DnsResult<String> {
    let mut mac = HmacSha1::new_from_slice(format!("{}&", secret).as_bytes())
        .map_err(|e| DnsProviderError::Configuration(format!("Invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn classify_error(status: StatusCode, body: &str) -> DnsProviderError {
    let (code, message) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => (err.code, err.message),
        Err(_) => (format!("HTTP {}", status.as_u16()), body.to_string()),
    };

    let auth_failure = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || code.starts_with("InvalidAccessKeyId")
        || code.starts_with("Forbidden")
        || code == "SignatureDoesNotMatch"
        || code == "IncompleteSignature";

    if auth_failure {
        DnsProviderError::Authentication(format!("{}: {}", code, message))
    } else if status == StatusCode::TOO_MANY_REQUESTS || code.starts_with("Throttling") {
        DnsProviderError::RateLimited(format!("{}: {}", code, message))
    } else {
        DnsProviderError::Api { code, message }
    }
}

// Alidns API types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRecordsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    domain_records: DomainRecords,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainRecords {
    #[serde(default)]
    record: Vec<AliyunRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AliyunRecord {
    record_id: String,
    #[serde(rename = "RR")]
    rr: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordIdResponse {
    #[serde(default)]
    record_id: String,
}
