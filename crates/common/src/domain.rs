//! Domain name newtype and DNS-01 naming helpers.
//!
//! Certificates are requested per domain, and every DNS-01 challenge record
//! lives in the zone of the domain's root (the last two labels). These helpers
//! keep that derivation in one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Label prepended to a domain to form its DNS-01 challenge record
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// Maximum length of a full domain name
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label
const MAX_LABEL_LEN: usize = 63;

/// Errors produced when parsing a domain name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainNameError {
    #[error("domain name is empty")]
    Empty,

    #[error("domain name '{0}' exceeds {MAX_DOMAIN_LEN} characters")]
    TooLong(String),

    #[error("domain name '{name}' has an invalid label '{label}'")]
    InvalidLabel { name: String, label: String },

    #[error("domain name '{0}' must have at least two labels")]
    NotQualified(String),
}

/// A validated, lower-cased domain name such as `api.example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Parse and normalize a domain name
    ///
    /// Surrounding whitespace and a trailing dot are removed and the name is
    /// lower-cased. Each label must be 1-63 characters of ASCII letters,
    /// digits or hyphens, not starting or ending with a hyphen.
    pub fn parse(input: &str) -> Result<Self, DomainNameError> {
        let name = input.trim().trim_end_matches('.').to_ascii_lowercase();

        if name.is_empty() {
            return Err(DomainNameError::Empty);
        }
        if name.len() > MAX_DOMAIN_LEN {
            return Err(DomainNameError::TooLong(name));
        }

        for label in name.split('.') {
            let valid = !label.is_empty()
                && label.len() <= MAX_LABEL_LEN
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(DomainNameError::InvalidLabel {
                    name: name.clone(),
                    label: label.to_string(),
                });
            }
        }

        if !name.contains('.') {
            return Err(DomainNameError::NotQualified(name));
        }

        Ok(Self(name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The registrable root of this domain: its last two labels
    ///
    /// `api.example.com` -> `example.com`
    pub fn root_domain(&self) -> &str {
        match self.0.rmatch_indices('.').nth(1) {
            Some((idx, _)) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Whether this domain is its own root
    pub fn is_root(&self) -> bool {
        self.root_domain() == self.0
    }

    /// Fully-qualified DNS-01 challenge record name
    ///
    /// `api.example.com` -> `_acme-challenge.api.example.com`
    pub fn challenge_fqdn(&self) -> String {
        format!("{}.{}", ACME_CHALLENGE_LABEL, self.0)
    }

    /// Challenge record name relative to the root domain's zone
    ///
    /// `api.example.com` -> `_acme-challenge.api`, `example.com` -> `_acme-challenge`
    pub fn challenge_record_name(&self) -> String {
        let fqdn = self.challenge_fqdn();
        let suffix = format!(".{}", self.root_domain());
        match fqdn.strip_suffix(&suffix) {
            Some(relative) => relative.to_string(),
            None => fqdn,
        }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DomainName {
    type Err = DomainNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DomainName {
    type Error = DomainNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DomainName> for String {
    fn from(domain: DomainName) -> Self {
        domain.0
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
