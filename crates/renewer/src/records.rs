//! Certificate record store
//!
//! A single JSON document mapping each domain to the expiry the job believes
//! its published certificate has. It is the only input to renewal decisions;
//! the certificate files themselves are never parsed.
//!
//! # File Format
//!
//! ```json
//! {
//!   "example.com": {
//!     "expiry_date": "2025-03-01T08:00:00+00:00",
//!     "updated_at": "2024-12-01T08:00:00+00:00",
//!     "status": "active"
//!   }
//! }
//! ```
//!
//! The document is loaded once and rewritten in full after every successful
//! domain cycle. Writes go to a temporary file in the same directory which is
//! then renamed over the original, so readers never observe a partial file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use crate::error::StoreError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Lifecycle status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// A certificate was issued (or reused) and published successfully
    Active,
    /// Anything else found on disk
    #[serde(other)]
    Unknown,
}

/// Last-known state of one domain's published certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRecord {
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
}

impl CertificateRecord {
    fn active(now: DateTime<Utc>, validity_days: u32) -> Self {
        let expiry = now + Duration::days(i64::from(validity_days));
        Self {
            expiry_date: Some(expiry.to_rfc3339()),
            updated_at: Some(now.to_rfc3339()),
            status: Some(RecordStatus::Active),
        }
    }

    /// Parsed expiry, `None` when absent or unparseable
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.as_deref().and_then(parse_timestamp)
    }

    pub fn is_active(&self) -> bool {
        self.status == Some(RecordStatus::Active)
    }

    /// Keep whichever fields of a malformed entry still have the right type
    fn salvage(value: &Value) -> Self {
        let text = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_string);
        Self {
            expiry_date: text("expiry_date"),
            updated_at: text("updated_at"),
            status: value
                .get("status")
                .and_then(|s| RecordStatus::deserialize(s).ok()),
        }
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as local time
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Decode the store document one entry at a time
fn parse_records(path: &Path, content: &str) -> BTreeMap<String, CertificateRecord> {
    let entries: Map<String, Value> = match serde_json::from_str(content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to parse certificate records, starting empty"
            );
            return BTreeMap::new();
        }
    };

    entries
        .into_iter()
        .map(|(domain, value)| {
            let record = match CertificateRecord::deserialize(&value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        domain = %domain,
                        error = %e,
                        "Malformed certificate record, keeping usable fields"
                    );
                    CertificateRecord::salvage(&value)
                }
            };
            (domain, record)
        })
        .collect()
}

/// Certificate record store backed by a single JSON file
#[derive(Debug)]
pub struct CertificateRecordStore {
    path: PathBuf,
    records: BTreeMap<String, CertificateRecord>,
}

impl CertificateRecordStore {
    /// Load the store from `path`
    ///
    /// A missing file yields an empty store. An unreadable file, or one that
    /// is not a JSON object, also yields an empty store, with a warning: every
    /// domain will then be treated as needing issuance. A single malformed
    /// entry only loses its own mistyped fields.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let records = match fs::read_to_string(&path) {
            Ok(content) => parse_records(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No certificate record file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read certificate records, starting empty"
                );
                BTreeMap::new()
            }
        };

        info!(
            path = %path.display(),
            record_count = records.len(),
            "Loaded certificate records"
        );

        Self { path, records }
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, domain: &str) -> Option<&CertificateRecord> {
        self.records.get(domain)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if a domain needs (re)issuance
    ///
    /// Returns `true` if:
    /// - No record exists for the domain
    /// - The record has no parseable expiry
    /// - The expiry is `threshold_days` whole days away or fewer
    pub fn needs_renewal(&self, domain: &str, threshold_days: u32) -> bool {
        self.needs_renewal_at(domain, threshold_days, Utc::now())
    }

    /// [`needs_renewal`](Self::needs_renewal) against an explicit clock
    pub fn needs_renewal_at(&self, domain: &str, threshold_days: u32, now: DateTime<Utc>) -> bool {
        let Some(record) = self.records.get(domain) else {
            info!(domain = %domain, "No certificate record, issuance required");
            return true;
        };

        let Some(expiry) = record.expiry() else {
            info!(
                domain = %domain,
                expiry_date = ?record.expiry_date,
                "Certificate record has no usable expiry, renewal required"
            );
            return true;
        };

        // Whole days, rounded down like a calendar countdown
        let days_remaining = (expiry - now).num_seconds().div_euclid(SECONDS_PER_DAY);
        let needs_renewal = days_remaining <= i64::from(threshold_days);

        if needs_renewal {
            info!(
                domain = %domain,
                days_remaining,
                threshold_days,
                "Certificate expires within threshold, renewal required"
            );
        } else {
            info!(
                domain = %domain,
                days_remaining,
                threshold_days,
                "Certificate is still valid"
            );
        }

        needs_renewal
    }

    /// Whether the domain has a record marked active
    pub fn has_active_record(&self, domain: &str) -> bool {
        self.records.get(domain).is_some_and(CertificateRecord::is_active)
    }

    /// Mark a domain as freshly published and persist the store
    ///
    /// The expiry is assumed to be `validity_days` from now. If the write
    /// fails the in-memory record is restored, so the store never reports
    /// state that is not on disk.
    pub fn record_success(&mut self, domain: &str, validity_days: u32) -> Result<(), StoreError> {
        self.record_success_at(domain, validity_days, Utc::now())
    }

    /// [`record_success`](Self::record_success) against an explicit clock
    pub fn record_success_at(
        &mut self,
        domain: &str,
        validity_days: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let record = CertificateRecord::active(now, validity_days);
        let previous = self.records.insert(domain.to_string(), record);

        if let Err(e) = self.save() {
            match previous {
                Some(previous) => {
                    self.records.insert(domain.to_string(), previous);
                }
                None => {
                    self.records.remove(domain);
                }
            }
            return Err(e);
        }

        info!(
            domain = %domain,
            validity_days,
            path = %self.path.display(),
            "Certificate record saved"
        );
        Ok(())
    }

    /// Atomically replace the backing file with the current records
    fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        let content = serde_json::to_string_pretty(&self.records)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }

        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        trace!(
            path = %self.path.display(),
            record_count = self.records.len(),
            "Certificate records written"
        );
        Ok(())
    }
}
