//! Provider credentials and tuning knobs.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default Alidns RPC endpoint
pub const DEFAULT_ALIYUN_ENDPOINT: &str = "https://alidns.aliyuncs.com";

/// Default Qiniu management API base
pub const DEFAULT_QINIU_API_BASE: &str = "http://api.qiniu.com";

/// Aliyun (Alidns) credentials used for DNS-01 challenge records
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct AliyunConfig {
    #[validate(length(min = 1, message = "aliyun.access_key_id must not be empty"))]
    pub access_key_id: String,

    #[validate(length(min = 1, message = "aliyun.access_key_secret must not be empty"))]
    pub access_key_secret: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// API endpoint, overridable for testing or regional endpoints
    #[serde(default = "default_aliyun_endpoint")]
    pub endpoint: String,
}

/// Qiniu credentials used to upload certificates and bind them to the CDN
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct QiniuConfig {
    #[validate(length(min = 1, message = "qiniu.access_key must not be empty"))]
    pub access_key: String,

    #[validate(length(min = 1, message = "qiniu.secret_key must not be empty"))]
    pub secret_key: String,

    /// Redirect plain HTTP to HTTPS on the CDN domain
    #[serde(default)]
    pub force_https: bool,

    #[serde(default = "default_qiniu_api_base")]
    pub api_base: String,
}

/// DNS propagation wait applied after writing a challenge record
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PropagationConfig {
    #[serde(default = "default_propagation_delay")]
    #[validate(range(max = 3600, message = "propagation.delay_secs must be at most 3600"))]
    pub delay_secs: u64,

    /// Also wait after updating an existing record in place
    #[serde(default = "default_true")]
    pub wait_on_update: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_propagation_delay(),
            wait_on_update: true,
        }
    }
}

// Secrets stay out of debug output.

impl std::fmt::Debug for AliyunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunConfig")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl std::fmt::Debug for QiniuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QiniuConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("force_https", &self.force_https)
            .field("api_base", &self.api_base)
            .finish()
    }
}

pub(crate) fn default_region() -> String {
    "cn-hangzhou".to_string()
}

pub(crate) fn default_aliyun_endpoint() -> String {
    DEFAULT_ALIYUN_ENDPOINT.to_string()
}

pub(crate) fn default_qiniu_api_base() -> String {
    DEFAULT_QINIU_API_BASE.to_string()
}

pub(crate) fn default_propagation_delay() -> u64 {
    60
}

fn default_true() -> bool {
    true
}
