//! Configuration for the certrelay renewal job
//!
//! The configuration is loaded once at startup and is static for the run.
//! JSON is the primary format (`config.json`); TOML and KDL files are accepted
//! based on their extension.
//!
//! # Module Organization
//!
//! - [`providers`]: DNS and CDN provider credentials, propagation tuning
//! - [`validation`]: Semantic checks beyond per-field constraints
//! - `kdl`: KDL format parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

// ============================================================================
// Module Declarations
// ============================================================================

mod kdl;
pub mod providers;
pub mod validation;

// ============================================================================
// Re-exports
// ============================================================================

pub use providers::{
    AliyunConfig, PropagationConfig, QiniuConfig, DEFAULT_ALIYUN_ENDPOINT, DEFAULT_QINIU_API_BASE,
};

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// ACME server name that maps to acme.sh's built-in default
pub const DEFAULT_ACME_SERVER: &str = "letsencrypt";

// ============================================================================
// Main Configuration Structure
// ============================================================================

/// Main configuration structure for certrelay
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validation::validate_config_semantics"))]
pub struct Config {
    /// Domains to process, in order
    #[serde(default)]
    pub domains: Vec<String>,

    /// Renew when the recorded expiry is this many days away or fewer
    #[serde(default = "default_renewal_days")]
    #[validate(range(max = 365, message = "renewal_days_before_expiry must be at most 365"))]
    pub renewal_days_before_expiry: u32,

    /// acme.sh home directory, `~` is expanded
    #[serde(default = "default_acme_home")]
    pub acme_home: PathBuf,

    /// Account email passed to acme.sh; empty means none
    #[serde(default)]
    pub email: Option<String>,

    /// ACME directory name or URL
    #[serde(default = "default_acme_server")]
    pub acme_server: String,

    #[validate(nested)]
    pub aliyun: AliyunConfig,

    #[validate(nested)]
    pub qiniu: QiniuConfig,

    /// Certificate record store
    #[serde(default = "default_record_file")]
    pub record_file: PathBuf,

    /// Log file appended to alongside stdout; empty disables it
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Assumed lifetime of a freshly issued certificate
    #[serde(default = "default_validity_days")]
    #[validate(range(min = 1, max = 825, message = "certificate_validity_days must be 1-825"))]
    pub certificate_validity_days: u32,

    /// Upper bound for a single acme.sh invocation
    #[serde(default = "default_acme_timeout")]
    #[validate(range(min = 1, message = "acme_timeout_secs must be positive"))]
    pub acme_timeout_secs: u64,

    /// Timeout for DNS and CDN API requests
    #[serde(default = "default_http_timeout")]
    #[validate(range(min = 1, message = "http_timeout_secs must be positive"))]
    pub http_timeout_secs: u64,

    #[serde(default)]
    #[validate(nested)]
    pub propagation: PropagationConfig,
}

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration from a file
    ///
    /// The format is picked from the extension; files without one are read as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("json");

        let config = match extension {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            "kdl" => Self::from_kdl(&content),
            _ => Err(anyhow::anyhow!("Unsupported config format: {}", extension)),
        }?;

        tracing::debug!(
            path = %path.display(),
            domain_count = config.domains.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Parse configuration from JSON format
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse JSON configuration")
    }

    /// Parse configuration from TOML format
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Parse configuration from KDL format
    pub fn from_kdl(content: &str) -> Result<Self> {
        let doc: ::kdl::KdlDocument = content
            .parse()
            .map_err(|e: ::kdl::KdlError| anyhow::anyhow!("{}", kdl::render_parse_error(content, &e)))?;

        kdl::parse_kdl_document(&doc)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))
    }

    /// acme.sh home with a leading `~` expanded from `$HOME`
    pub fn acme_home(&self) -> PathBuf {
        expand_home(&self.acme_home)
    }

    /// Account email, if set and non-empty
    pub fn account_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    /// ACME server to pass as `--server`, or `None` for acme.sh's default
    pub fn acme_server_override(&self) -> Option<&str> {
        let server = self.acme_server.trim();
        if server.is_empty() || server.eq_ignore_ascii_case(DEFAULT_ACME_SERVER) {
            None
        } else {
            Some(server)
        }
    }

    /// Log file path, or `None` when file logging is disabled
    pub fn log_file(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

// ============================================================================
// Defaults
// ============================================================================

pub(crate) fn default_renewal_days() -> u32 {
    30
}

pub(crate) fn default_acme_home() -> PathBuf {
    PathBuf::from("~/.acme.sh")
}

pub(crate) fn default_acme_server() -> String {
    DEFAULT_ACME_SERVER.to_string()
}

pub(crate) fn default_record_file() -> PathBuf {
    PathBuf::from("cert_records.json")
}

pub(crate) fn default_log_file() -> String {
    "certrelay.log".to_string()
}

pub(crate) fn default_validity_days() -> u32 {
    90
}

pub(crate) fn default_acme_timeout() -> u64 {
    600
}

pub(crate) fn default_http_timeout() -> u64 {
    30
}
