//! Shared fakes for the renewal flow tests
//!
//! Each fake keeps its call log behind an `Arc` so tests can inspect it after
//! handing the fake to the orchestrator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use certrelay_common::DomainName;
use certrelay_config::PropagationConfig;
use certrelay_renewer::acme::{
    AcmeError, AcmeShClient, ArtifactPaths, CommandOutput, CommandRunner,
};
use certrelay_renewer::dns::{
    DnsChallengeManager, DnsProvider, DnsProviderError, DnsRecord, DnsResult, TXT_RECORD_TYPE,
};
use certrelay_renewer::publish::{CertificatePublisher, PublishError, PublishReceipt};
use certrelay_renewer::{CertificateRecordStore, RenewalOrchestrator, RenewalPolicy};

pub const RECORD_FILE: &str = "cert_records.json";

// ============================================================================
// acme.sh
// ============================================================================

/// Stands in for acme.sh
///
/// The challenge invocation prints `TXT value: 'tok-<domain>'`; the completion
/// invocation writes an ECC artifact set under the acme home, like the real
/// script does after a successful validation.
#[derive(Debug, Default)]
pub struct FakeAcmeRunner {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub fail_validation_for: Mutex<Option<String>>,
}

impl FakeAcmeRunner {
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

fn domain_arg(args: &[String]) -> String {
    args.iter()
        .position(|a| a == "-d")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl CommandRunner for FakeAcmeRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, AcmeError> {
        self.calls.lock().push(args.to_vec());
        let domain = domain_arg(args);

        if args.iter().any(|a| a == "--dns") {
            return Ok(CommandOutput {
                exit_code: Some(3),
                stdout: format!(
                    "[Mon Jan  6 10:00:00 UTC 2025] Domain: '_acme-challenge.{domain}'\n\
                     [Mon Jan  6 10:00:00 UTC 2025] TXT value: 'tok-{domain}'\n"
                ),
                stderr: String::new(),
            });
        }

        if self.fail_validation_for.lock().as_deref() == Some(domain.as_str()) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "Verify error:DNS problem: NXDOMAIN".to_string(),
            });
        }

        let home = program.parent().unwrap_or(Path::new("."));
        write_artifacts(home, &domain, "renewed");
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: "Cert success.".to_string(),
            stderr: String::new(),
        })
    }
}

/// Write an ECC artifact set for `domain` under `home`
pub fn write_artifacts(home: &Path, domain: &str, marker: &str) -> PathBuf {
    let dir = home.join(format!("{}_ecc", domain));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("fullchain.cer"), format!("CHAIN {}", marker)).unwrap();
    std::fs::write(dir.join(format!("{}.key", domain)), format!("KEY {}", marker)).unwrap();
    std::fs::write(dir.join("ca.cer"), "CA").unwrap();
    dir
}

// ============================================================================
// DNS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsCall {
    Find,
    Create,
    Update,
    Delete,
}

/// In-memory DNS zone store
#[derive(Debug, Default)]
pub struct FakeDnsProvider {
    /// (root domain, record) by record ID
    pub records: Mutex<HashMap<String, (String, DnsRecord)>>,
    pub calls: Mutex<Vec<DnsCall>>,
    next_id: Mutex<u32>,
    /// Root domain whose lookups fail with a network error
    pub unreachable_root: Mutex<Option<String>>,
    /// Reject every delete, leaving the record in place
    pub fail_delete: Mutex<bool>,
}

impl FakeDnsProvider {
    pub fn seed(&self, root: &str, name: &str, value: &str) -> String {
        let id = self.allocate_id();
        self.records.lock().insert(
            id.clone(),
            (
                root.to_string(),
                DnsRecord {
                    id: id.clone(),
                    name: name.to_string(),
                    record_type: TXT_RECORD_TYPE.to_string(),
                    value: value.to_string(),
                },
            ),
        );
        id
    }

    pub fn count(&self, call: DnsCall) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn allocate_id(&self) -> String {
        let mut next = self.next_id.lock();
        *next += 1;
        format!("rec-{}", *next)
    }
}

#[async_trait]
impl DnsProvider for FakeDnsProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn find_txt_record(
        &self,
        root_domain: &str,
        record_name: &str,
    ) -> DnsResult<Option<DnsRecord>> {
        self.calls.lock().push(DnsCall::Find);
        if self.unreachable_root.lock().as_deref() == Some(root_domain) {
            return Err(DnsProviderError::Network(
                "error sending request: connection refused".to_string(),
            ));
        }
        Ok(self
            .records
            .lock()
            .values()
            .find(|(root, r)| root == root_domain && r.name == record_name)
            .map(|(_, r)| r.clone()))
    }

    async fn create_txt_record(
        &self,
        root_domain: &str,
        record_name: &str,
        value: &str,
    ) -> DnsResult<String> {
        self.calls.lock().push(DnsCall::Create);
        Ok(self.seed(root_domain, record_name, value))
    }

    async fn update_txt_record(
        &self,
        record_id: &str,
        _record_name: &str,
        value: &str,
    ) -> DnsResult<()> {
        self.calls.lock().push(DnsCall::Update);
        match self.records.lock().get_mut(record_id) {
            Some((_, record)) => {
                record.value = value.to_string();
                Ok(())
            }
            None => Err(DnsProviderError::Api {
                code: "DomainRecordNotBelongToUser".to_string(),
                message: record_id.to_string(),
            }),
        }
    }

    async fn delete_record(&self, record_id: &str) -> DnsResult<()> {
        self.calls.lock().push(DnsCall::Delete);
        if *self.fail_delete.lock() {
            return Err(DnsProviderError::Api {
                code: "InternalError".to_string(),
                message: "The request processing has failed due to some unknown error.".to_string(),
            });
        }
        self.records.lock().remove(record_id);
        Ok(())
    }
}

// ============================================================================
// CDN
// ============================================================================

/// Records what was published
#[derive(Debug, Default)]
pub struct FakePublisher {
    /// (domain, full chain contents)
    pub published: Mutex<Vec<(String, String)>>,
    pub fail_for: Mutex<Option<String>>,
}

#[async_trait]
impl CertificatePublisher for FakePublisher {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn publish(
        &self,
        domain: &DomainName,
        artifacts: &ArtifactPaths,
    ) -> Result<PublishReceipt, PublishError> {
        if self.fail_for.lock().as_deref() == Some(domain.as_str()) {
            return Err(PublishError::Status {
                step: "certificate upload",
                status: 500,
                body: "internal error".to_string(),
            });
        }

        let chain = std::fs::read_to_string(&artifacts.fullchain).map_err(|source| {
            PublishError::ArtifactRead {
                path: artifacts.fullchain.clone(),
                source,
            }
        })?;
        self.published.lock().push((domain.to_string(), chain));

        Ok(PublishReceipt {
            cert_id: format!("cert-{}", domain),
            cert_name: format!("{}_20250106100000", domain),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub runner: Arc<FakeAcmeRunner>,
    pub dns: Arc<FakeDnsProvider>,
    pub publisher: Arc<FakePublisher>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
            runner: Arc::new(FakeAcmeRunner::default()),
            dns: Arc::new(FakeDnsProvider::default()),
            publisher: Arc::new(FakePublisher::default()),
        }
    }

    pub fn acme_home(&self) -> PathBuf {
        self.dir.path().join("acme")
    }

    pub fn record_file(&self) -> PathBuf {
        self.dir.path().join(RECORD_FILE)
    }

    /// Write a record store file with one active record
    pub fn seed_record(&self, domain: &str, expiry: DateTime<Utc>) {
        let doc = serde_json::json!({
            domain: {
                "expiry_date": expiry.to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339(),
                "status": "active"
            }
        });
        std::fs::write(self.record_file(), serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    }

    pub fn record_file_contents(&self) -> Option<serde_json::Value> {
        let content = std::fs::read_to_string(self.record_file()).ok()?;
        Some(serde_json::from_str(&content).unwrap())
    }

    /// Build an orchestrator over the fakes, loading the store from disk
    pub fn orchestrator(&self) -> RenewalOrchestrator {
        std::fs::create_dir_all(self.acme_home()).unwrap();

        let dns = DnsChallengeManager::new(
            self.dns.clone(),
            &PropagationConfig {
                delay_secs: 0,
                wait_on_update: true,
            },
        );
        let acme = AcmeShClient::new(self.runner.clone(), self.acme_home());

        RenewalOrchestrator::new(
            CertificateRecordStore::load(self.record_file()),
            dns,
            acme,
            self.publisher.clone(),
            RenewalPolicy {
                renewal_days_before_expiry: 30,
                certificate_validity_days: 90,
            },
        )
    }
}

pub fn domain(s: &str) -> DomainName {
    DomainName::parse(s).unwrap()
}
