//! DNS provider trait for DNS-01 challenges
//!
//! Defines the record operations the challenge manager needs from a provider.

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Result type for DNS operations
pub type DnsResult<T> = Result<T, DnsProviderError>;

/// Errors that can occur during DNS provider operations
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limited by provider
    #[error("Rate limited by DNS provider: {0}")]
    RateLimited(String),

    /// Request timeout
    #[error("Request timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with an error code
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// The provider answered with something we could not decode
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider-assigned record ID
    pub id: String,
    /// Name relative to the zone, e.g. `_acme-challenge.api`
    pub name: String,
    /// Record type, e.g. `TXT`
    pub record_type: String,
    pub value: String,
}

/// Trait for DNS providers that can host DNS-01 challenge records
///
/// Records are addressed by the root zone (`example.com`) and a name relative
/// to it (`_acme-challenge.api`).
#[async_trait]
pub trait DnsProvider: Send + Sync + Debug {
    /// Returns the provider name (e.g., "aliyun")
    fn name(&self) -> &'static str;

    /// Look up the TXT record with exactly this relative name
    async fn find_txt_record(
        &self,
        root_domain: &str,
        record_name: &str,
    ) -> DnsResult<Option<DnsRecord>>;

    /// Create a TXT record, returning its ID
    async fn create_txt_record(
        &self,
        root_domain: &str,
        record_name: &str,
        value: &str,
    ) -> DnsResult<String>;

    /// Replace the value of an existing TXT record, keeping its ID
    async fn update_txt_record(&self, record_id: &str, record_name: &str, value: &str)
        -> DnsResult<()>;

    /// Delete a record by ID
    async fn delete_record(&self, record_id: &str) -> DnsResult<()>;
}

/// Record type used for DNS-01 challenges
pub const TXT_RECORD_TYPE: &str = "TXT";
