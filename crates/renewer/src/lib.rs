//! certrelay renewal job
//!
//! Keeps TLS certificates for a list of domains fresh: it decides which
//! domains are due, obtains certificates from acme.sh with DNS-01 challenges
//! served through Aliyun DNS, publishes them to the Qiniu CDN, and records
//! each success in a JSON store so the next scheduled run knows what to skip.
//!
//! # Module Organization
//!
//! - [`records`]: Certificate record store and renewal arithmetic
//! - [`dns`]: DNS provider trait, Alidns provider, challenge record manager
//! - [`acme`]: acme.sh invocation and output parsing
//! - [`publish`]: Certificate publishing to the CDN
//! - [`orchestrator`]: Per-domain decision and run summary
//! - [`error`]: Error types

pub mod acme;
pub mod dns;
pub mod error;
pub mod orchestrator;
pub mod publish;
pub mod records;

pub use error::{RenewError, StoreError};
pub use orchestrator::{
    DomainOutcome, RenewalDecision, RenewalOrchestrator, RenewalPolicy, RunSummary,
};
pub use records::{CertificateRecord, CertificateRecordStore, RecordStatus};
