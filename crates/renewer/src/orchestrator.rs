//! Per-domain renewal orchestration
//!
//! Each configured domain goes through one decision:
//!
//! ```text
//! needs renewal? no  -> UpToDate
//!                yes -> certificate on disk? no  -> FreshIssue  -> publish
//!                                            yes -> active record? yes -> ForceRenew -> publish
//!                                                                  no  -> PublishOnly
//! ```
//!
//! A successful publish is followed by writing the record store. Domains are
//! processed one at a time and a failing (or panicking) domain never stops
//! the rest of the run.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{error, info, warn};

use certrelay_common::DomainName;
use certrelay_config::Config;

use crate::acme::{AcmeShClient, IssueMode, TokioCommandRunner};
use crate::dns::{AliyunDnsProvider, DnsChallengeManager};
use crate::error::RenewError;
use crate::publish::{CertificatePublisher, PublishReceipt, QiniuPublisher};
use crate::records::CertificateRecordStore;

/// What to do for a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// Recorded expiry is far enough away
    UpToDate,
    /// No certificate on disk: issue one, then publish
    FreshIssue,
    /// Certificate on disk and recorded as active: renew it, then publish
    ForceRenew,
    /// Certificate on disk but never recorded as published: publish it
    PublishOnly,
}

impl RenewalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalDecision::UpToDate => "up_to_date",
            RenewalDecision::FreshIssue => "fresh_issue",
            RenewalDecision::ForceRenew => "force_renew",
            RenewalDecision::PublishOnly => "publish_only",
        }
    }
}

impl std::fmt::Display for RenewalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renewal thresholds
#[derive(Debug, Clone, Copy)]
pub struct RenewalPolicy {
    /// Renew when this many days or fewer remain
    pub renewal_days_before_expiry: u32,
    /// Lifetime assumed for a freshly published certificate
    pub certificate_validity_days: u32,
}

impl RenewalPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            renewal_days_before_expiry: config.renewal_days_before_expiry,
            certificate_validity_days: config.certificate_validity_days,
        }
    }
}

/// Result of processing one domain
#[derive(Debug)]
pub struct DomainOutcome {
    /// The domain as configured
    pub domain: String,
    /// `None` if the name was invalid or processing panicked before a decision
    pub decision: Option<RenewalDecision>,
    pub receipt: Option<PublishReceipt>,
    pub error: Option<RenewError>,
    pub elapsed: Duration,
}

impl DomainOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Totals for a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<DomainOutcome>,
}

impl RunSummary {
    fn push(&mut self, outcome: DomainOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Domains that failed, in processing order
    pub fn failed_domains(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.domain.as_str())
    }
}

/// Drives every domain through decide, issue, publish, record
#[derive(Debug)]
pub struct RenewalOrchestrator {
    store: CertificateRecordStore,
    dns: DnsChallengeManager,
    acme: AcmeShClient,
    publisher: Arc<dyn CertificatePublisher>,
    policy: RenewalPolicy,
}

impl RenewalOrchestrator {
    pub fn new(
        store: CertificateRecordStore,
        dns: DnsChallengeManager,
        acme: AcmeShClient,
        publisher: Arc<dyn CertificatePublisher>,
        policy: RenewalPolicy,
    ) -> Self {
        Self {
            store,
            dns,
            acme,
            publisher,
            policy,
        }
    }

    /// Wire up the production collaborators from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let http_timeout = Duration::from_secs(config.http_timeout_secs);

        let provider = AliyunDnsProvider::new(&config.aliyun, http_timeout)
            .context("Failed to create Aliyun DNS provider")?;
        let publisher = QiniuPublisher::new(&config.qiniu, http_timeout)
            .context("Failed to create Qiniu publisher")?;

        let dns = DnsChallengeManager::new(Arc::new(provider), &config.propagation);
        let acme = AcmeShClient::from_config(Arc::new(TokioCommandRunner), config);
        let store = CertificateRecordStore::load(&config.record_file);

        Ok(Self::new(
            store,
            dns,
            acme,
            Arc::new(publisher),
            RenewalPolicy::from_config(config),
        ))
    }

    pub fn store(&self) -> &CertificateRecordStore {
        &self.store
    }

    /// Pick the branch for a domain from the record store and the disk
    pub fn decide(&self, domain: &DomainName) -> RenewalDecision {
        if !self
            .store
            .needs_renewal(domain.as_str(), self.policy.renewal_days_before_expiry)
        {
            return RenewalDecision::UpToDate;
        }

        if !self.acme.artifact_paths(domain).exists() {
            return RenewalDecision::FreshIssue;
        }

        if self.store.has_active_record(domain.as_str()) {
            RenewalDecision::ForceRenew
        } else {
            RenewalDecision::PublishOnly
        }
    }

    /// Process all domains in order
    ///
    /// Names are parsed one at a time; an invalid name becomes a failed
    /// outcome and the run moves on.
    pub async fn run<D: AsRef<str>>(&mut self, domains: &[D]) -> RunSummary {
        let mut summary = RunSummary::default();

        for (index, raw) in domains.iter().enumerate() {
            let domain = raw.as_ref();
            info!(
                domain = %domain,
                position = index + 1,
                total = domains.len(),
                "Processing domain"
            );
            let outcome = match DomainName::parse(domain) {
                Ok(name) => self.process_domain(&name).await,
                Err(e) => DomainOutcome {
                    domain: domain.to_string(),
                    decision: None,
                    receipt: None,
                    error: Some(RenewError::from(e)),
                    elapsed: Duration::ZERO,
                },
            };

            match &outcome.error {
                None => info!(
                    domain = %domain,
                    decision = ?outcome.decision,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Domain processed successfully"
                ),
                Some(e) => error!(
                    domain = %domain,
                    decision = ?outcome.decision,
                    kind = e.kind(),
                    error = %e,
                    "Domain processing failed"
                ),
            }

            summary.push(outcome);
        }

        summary
    }

    /// Process one domain, converting a panic into a failed outcome
    pub async fn process_domain(&mut self, domain: &DomainName) -> DomainOutcome {
        let start = Instant::now();
        let mut decision = None;

        let result = AssertUnwindSafe(self.handle_domain(domain, &mut decision))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(RenewError::Panicked(panic_message(panic))));

        let (receipt, error) = match result {
            Ok(receipt) => (receipt, None),
            Err(e) => (None, Some(e)),
        };

        DomainOutcome {
            domain: domain.to_string(),
            decision,
            receipt,
            error,
            elapsed: start.elapsed(),
        }
    }

    async fn handle_domain(
        &mut self,
        domain: &DomainName,
        decision_out: &mut Option<RenewalDecision>,
    ) -> Result<Option<PublishReceipt>, RenewError> {
        let decision = self.decide(domain);
        *decision_out = Some(decision);
        info!(domain = %domain, decision = %decision, "Renewal decision");

        match decision {
            RenewalDecision::UpToDate => {
                info!(domain = %domain, "Certificate does not need renewal");
                Ok(None)
            }
            RenewalDecision::FreshIssue => self.handle_fresh_issue(domain).await.map(Some),
            RenewalDecision::ForceRenew => self.handle_force_renew(domain).await.map(Some),
            RenewalDecision::PublishOnly => self.handle_publish_only(domain).await.map(Some),
        }
    }

    async fn handle_fresh_issue(
        &mut self,
        domain: &DomainName,
    ) -> Result<PublishReceipt, RenewError> {
        info!(domain = %domain, "Issuing first certificate");
        self.issue(domain, IssueMode::Issue).await?;
        self.publish_and_record(domain).await
    }

    async fn handle_force_renew(
        &mut self,
        domain: &DomainName,
    ) -> Result<PublishReceipt, RenewError> {
        info!(domain = %domain, "Certificate close to expiry, forcing renewal");
        self.issue(domain, IssueMode::ForceRenew).await?;
        self.publish_and_record(domain).await
    }

    async fn handle_publish_only(
        &mut self,
        domain: &DomainName,
    ) -> Result<PublishReceipt, RenewError> {
        info!(
            domain = %domain,
            "Certificate on disk was never published, skipping issuance"
        );
        self.publish_and_record(domain).await
    }

    /// Challenge, DNS record, validation, cleanup
    async fn issue(&self, domain: &DomainName, mode: IssueMode) -> Result<(), RenewError> {
        let value = self.acme.request_challenge_value(domain, mode).await?;
        let record = self.dns.upsert_challenge_record(domain, &value).await?;

        let validation = self.acme.complete_validation(domain).await;

        // Orphaned records are tolerated
        if let Err(e) = self.dns.delete_challenge_record(&record).await {
            warn!(
                domain = %domain,
                record_id = %record.record_id,
                error = %e,
                "Challenge record left behind"
            );
        }

        validation.map_err(RenewError::from)
    }

    async fn publish_and_record(
        &mut self,
        domain: &DomainName,
    ) -> Result<PublishReceipt, RenewError> {
        let artifacts = self.acme.artifact_paths(domain);
        let receipt = self.publisher.publish(domain, &artifacts).await?;

        self.store
            .record_success(domain.as_str(), self.policy.certificate_validity_days)?;

        Ok(receipt)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
