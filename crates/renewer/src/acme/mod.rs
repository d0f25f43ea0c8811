//! acme.sh adapter
//!
//! - [`AcmeShClient`] - Two-phase manual DNS-01 issuance
//! - [`extract_challenge_value`] - Pulls the TXT value out of acme.sh output
//! - [`ArtifactPaths`] - Locates the certificate files acme.sh writes
//! - [`CommandRunner`] - Process execution seam, with a timeout

mod artifacts;
mod client;
mod error;
mod extract;
mod runner;

pub use artifacts::{ArtifactPaths, CA_FILE, FULLCHAIN_FILE};
pub use client::{AcmeShClient, IssueMode, MANUAL_DNS_ACK};
pub use error::AcmeError;
pub use extract::extract_challenge_value;
pub use runner::{CommandOutput, CommandRunner, TokioCommandRunner};
