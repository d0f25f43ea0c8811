//! DNS-01 challenge record management
//!
//! Writes the `_acme-challenge` TXT record for a domain, waits for it to
//! propagate, and removes it once validation is over.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use certrelay_common::DomainName;
use certrelay_config::PropagationConfig;

use super::provider::{DnsProvider, DnsResult};

/// A challenge record that has been written to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRecord {
    /// Zone the record lives in, e.g. `example.com`
    pub root_domain: String,
    /// Name relative to the zone, e.g. `_acme-challenge.api`
    pub record_name: String,
    pub value: String,
    /// Provider record ID, used for cleanup
    pub record_id: String,
    /// Whether the record was newly created rather than updated in place
    pub created: bool,
}

/// DNS-01 challenge manager
#[derive(Debug)]
pub struct DnsChallengeManager {
    provider: Arc<dyn DnsProvider>,
    propagation_delay: Duration,
    wait_on_update: bool,
}

impl DnsChallengeManager {
    /// Create a new manager from the propagation settings
    pub fn new(provider: Arc<dyn DnsProvider>, propagation: &PropagationConfig) -> Self {
        Self {
            provider,
            propagation_delay: Duration::from_secs(propagation.delay_secs),
            wait_on_update: propagation.wait_on_update,
        }
    }

    /// Override the propagation delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    /// Get the DNS provider name
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Make the domain's challenge record hold `value`
    ///
    /// An existing record with the same name is updated in place; otherwise a
    /// new one is created. Returns once the propagation wait has elapsed.
    pub async fn upsert_challenge_record(
        &self,
        domain: &DomainName,
        value: &str,
    ) -> DnsResult<ChallengeRecord> {
        let root_domain = domain.root_domain().to_string();
        let record_name = domain.challenge_record_name();

        let existing = self
            .provider
            .find_txt_record(&root_domain, &record_name)
            .await?;

        let (record_id, created) = match existing {
            Some(record) => {
                info!(
                    domain = %domain,
                    record = %record_name,
                    record_id = %record.id,
                    provider = %self.provider.name(),
                    "Updating existing DNS-01 challenge record"
                );
                self.provider
                    .update_txt_record(&record.id, &record_name, value)
                    .await?;
                (record.id, false)
            }
            None => {
                info!(
                    domain = %domain,
                    record = %record_name,
                    provider = %self.provider.name(),
                    "Creating DNS-01 challenge record"
                );
                let id = self
                    .provider
                    .create_txt_record(&root_domain, &record_name, value)
                    .await?;
                (id, true)
            }
        };

        if created || self.wait_on_update {
            self.wait_for_propagation(domain).await;
        }

        Ok(ChallengeRecord {
            root_domain,
            record_name,
            value: value.to_string(),
            record_id,
            created,
        })
    }

    /// Remove a challenge record
    pub async fn delete_challenge_record(&self, record: &ChallengeRecord) -> DnsResult<()> {
        debug!(
            record = %record.record_name,
            record_id = %record.record_id,
            "Cleaning up DNS-01 challenge record"
        );

        match self.provider.delete_record(&record.record_id).await {
            Ok(()) => {
                info!(record = %record.record_name, "DNS-01 challenge record cleaned up");
                Ok(())
            }
            Err(e) => {
                warn!(
                    record = %record.record_name,
                    record_id = %record.record_id,
                    error = %e,
                    "Failed to clean up DNS-01 challenge record"
                );
                Err(e)
            }
        }
    }

    async fn wait_for_propagation(&self, domain: &DomainName) {
        if self.propagation_delay.is_zero() {
            return;
        }
        debug!(
            domain = %domain,
            delay_secs = self.propagation_delay.as_secs(),
            "Waiting for DNS propagation"
        );
        tokio::time::sleep(self.propagation_delay).await;
    }
}
