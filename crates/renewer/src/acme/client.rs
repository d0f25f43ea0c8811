//! acme.sh client for manual-mode DNS-01 issuance
//!
//! Issuance is two invocations: the first prints the TXT value the CA expects,
//! the second (`--renew`) asks the CA to validate it and writes the
//! certificate once the record is in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use certrelay_common::DomainName;
use certrelay_config::Config;

use super::artifacts::ArtifactPaths;
use super::error::AcmeError;
use super::extract::extract_challenge_value;
use super::runner::CommandRunner;

/// Acknowledgement acme.sh requires before running manual DNS mode
pub const MANUAL_DNS_ACK: &str = "--yes-I-know-dns-manual-mode-enough-go-ahead-please";

const ACME_SH: &str = "acme.sh";

/// How the first invocation obtains a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueMode {
    /// `--issue`: no certificate on disk yet
    Issue,
    /// `--renew --force`: replace an existing certificate
    ForceRenew,
}

/// Drives the acme.sh script
#[derive(Debug)]
pub struct AcmeShClient {
    runner: Arc<dyn CommandRunner>,
    acme_home: PathBuf,
    email: Option<String>,
    server: Option<String>,
    timeout: Duration,
}

impl AcmeShClient {
    /// Create a client for the acme.sh installed in `acme_home`
    pub fn new(runner: Arc<dyn CommandRunner>, acme_home: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            acme_home: acme_home.into(),
            email: None,
            server: None,
            timeout: Duration::from_secs(600),
        }
    }

    /// Create a client from the run configuration
    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        let mut client = Self::new(runner, config.acme_home())
            .with_timeout(Duration::from_secs(config.acme_timeout_secs));
        if let Some(email) = config.account_email() {
            client = client.with_email(email);
        }
        if let Some(server) = config.acme_server_override() {
            client = client.with_server(server);
        }
        client
    }

    /// Set the account email (`--accountemail`)
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set a non-default ACME server (`--server`)
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Set the per-invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn acme_home(&self) -> &Path {
        &self.acme_home
    }

    /// Path of the acme.sh script
    pub fn program(&self) -> PathBuf {
        self.acme_home.join(ACME_SH)
    }

    /// Where acme.sh keeps (or will keep) this domain's certificate
    pub fn artifact_paths(&self, domain: &DomainName) -> ArtifactPaths {
        ArtifactPaths::locate(&self.acme_home, domain)
    }

    /// Arguments for the challenge-requesting invocation
    pub fn issue_args(&self, domain: &DomainName, mode: IssueMode) -> Vec<String> {
        let mut args: Vec<String> = match mode {
            IssueMode::Issue => vec!["--issue".into()],
            IssueMode::ForceRenew => vec!["--renew".into(), "--force".into()],
        };
        args.extend([
            "--dns".to_string(),
            "-d".to_string(),
            domain.to_string(),
            MANUAL_DNS_ACK.to_string(),
        ]);
        if let Some(email) = &self.email {
            args.extend(["--accountemail".to_string(), email.clone()]);
        }
        if let Some(server) = &self.server {
            args.extend(["--server".to_string(), server.clone()]);
        }
        args
    }

    /// Arguments for the validating invocation
    pub fn completion_args(&self, domain: &DomainName) -> Vec<String> {
        vec![
            "--renew".to_string(),
            "-d".to_string(),
            domain.to_string(),
            MANUAL_DNS_ACK.to_string(),
        ]
    }

    /// Run the first invocation and return the TXT value to publish
    ///
    /// A complete certificate already on disk turns [`IssueMode::Issue`] into
    /// [`IssueMode::ForceRenew`], since acme.sh refuses to re-issue it.
    pub async fn request_challenge_value(
        &self,
        domain: &DomainName,
        mode: IssueMode,
    ) -> Result<String, AcmeError> {
        let mode = if mode == IssueMode::Issue && self.artifact_paths(domain).exists() {
            debug!(domain = %domain, "Certificate already on disk, forcing renewal");
            IssueMode::ForceRenew
        } else {
            mode
        };

        info!(
            domain = %domain,
            mode = ?mode,
            server = self.server.as_deref().unwrap_or("letsencrypt"),
            "Requesting DNS-01 challenge from acme.sh"
        );

        // acme.sh exits non-zero in manual mode after printing the record,
        // so only the output matters here
        let output = self
            .runner
            .run(&self.program(), &self.issue_args(domain, mode), self.timeout)
            .await?;

        let combined = format!("{}\n{}", output.stdout, output.stderr);
        match extract_challenge_value(&combined) {
            Some(value) => {
                info!(domain = %domain, txt_value = %value, "Extracted challenge value");
                Ok(value)
            }
            None => {
                error!(
                    domain = %domain,
                    exit_code = ?output.exit_code,
                    stdout = %output.stdout,
                    stderr = %output.stderr,
                    "No challenge value in acme.sh output"
                );
                Err(AcmeError::ChallengeNotFound {
                    domain: domain.to_string(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
        }
    }

    /// Run the second invocation; succeeds only on exit code 0
    pub async fn complete_validation(&self, domain: &DomainName) -> Result<(), AcmeError> {
        info!(domain = %domain, "Asking acme.sh to complete validation");

        let output = self
            .runner
            .run(&self.program(), &self.completion_args(domain), self.timeout)
            .await?;

        if output.success() {
            info!(domain = %domain, "Certificate issued");
            Ok(())
        } else {
            error!(
                domain = %domain,
                exit_code = ?output.exit_code,
                stderr = %output.stderr,
                "acme.sh validation failed"
            );
            Err(AcmeError::ValidationFailed {
                domain: domain.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}
