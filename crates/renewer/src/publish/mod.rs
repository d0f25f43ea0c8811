//! Certificate publishing to the CDN
//!
//! - [`CertificatePublisher`] - Trait for publishing targets
//! - [`QiniuPublisher`] - Uploads to Qiniu SSL storage and binds the CDN domain

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use certrelay_common::DomainName;

use crate::acme::ArtifactPaths;

mod qiniu;

pub use qiniu::QiniuPublisher;

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Certificate ID assigned by the CDN
    pub cert_id: String,
    /// Name the certificate was uploaded under
    pub cert_name: String,
}

/// Errors that can occur while publishing a certificate
#[derive(Debug, Error)]
pub enum PublishError {
    /// A certificate or key file could not be read
    #[error("Failed to read {path}: {source}")]
    ArtifactRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection-level failure
    #[error("Network error during {step}: {message}")]
    Network { step: &'static str, message: String },

    /// Request timeout
    #[error("{step} timed out after {elapsed_secs}s")]
    Timeout { step: &'static str, elapsed_secs: u64 },

    /// The API answered with a non-200 status
    #[error("{step} failed with HTTP {status}: {body}")]
    Status {
        step: &'static str,
        status: u16,
        body: String,
    },

    /// The API answered with something we could not decode
    #[error("Invalid {step} response: {message}")]
    InvalidResponse { step: &'static str, message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// A target that serves certificates for domains
#[async_trait]
pub trait CertificatePublisher: Send + Sync + Debug {
    /// Returns the publisher name (e.g., "qiniu")
    fn name(&self) -> &'static str;

    /// Upload the domain's certificate and make it the active one
    async fn publish(
        &self,
        domain: &DomainName,
        artifacts: &ArtifactPaths,
    ) -> Result<PublishReceipt, PublishError>;
}
