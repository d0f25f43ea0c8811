//! Error types for the renewal job

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use certrelay_common::DomainNameError;

pub use crate::acme::AcmeError;
pub use crate::dns::DnsProviderError;
pub use crate::publish::PublishError;

/// Why a single domain's cycle failed
///
/// Every variant is recoverable at the run level: the orchestrator records
/// the failure and moves on to the next domain.
#[derive(Debug, Error)]
pub enum RenewError {
    /// The configured name is not a usable domain
    #[error("Invalid domain: {0}")]
    InvalidDomain(#[from] DomainNameError),

    /// DNS provider operation failed while preparing the challenge
    #[error("DNS challenge error: {0}")]
    Dns(#[from] DnsProviderError),

    /// acme.sh invocation or output parsing failed
    #[error("ACME error: {0}")]
    Acme(#[from] AcmeError),

    /// Uploading or binding the certificate failed
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// The record store could not be written after a successful publish
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Processing the domain panicked
    #[error("Unexpected failure: {0}")]
    Panicked(String),
}

impl RenewError {
    /// Short, stable label for logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            RenewError::InvalidDomain(_) => "domain",
            RenewError::Dns(_) => "dns",
            RenewError::Acme(_) => "acme",
            RenewError::Publish(_) => "publish",
            RenewError::Store(_) => "store",
            RenewError::Panicked(_) => "panic",
        }
    }
}

/// Errors specific to the certificate record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while writing the store file
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to serialize the records
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
