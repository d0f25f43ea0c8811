//! Configuration validation functions
//!
//! Field-level constraints live on the structs as `validator` attributes;
//! the checks here look across fields.

use std::borrow::Cow;
use std::collections::HashSet;

use tracing::trace;
use validator::ValidationError;

use crate::Config;

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

/// Cross-field checks run after per-field validation
///
/// Domain names are not parsed here. A malformed entry fails on its own when
/// the run reaches it.
pub fn validate_config_semantics(config: &Config) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for domain in &config.domains {
        let normalized = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if !seen.insert(normalized) {
            return Err(error(
                "duplicate_domain",
                format!("Domain '{}' is listed more than once", domain),
            ));
        }
    }

    if config.renewal_days_before_expiry >= config.certificate_validity_days {
        return Err(error(
            "renewal_threshold",
            format!(
                "renewal_days_before_expiry ({}) must be less than certificate_validity_days ({}), \
                 otherwise every run renews every certificate",
                config.renewal_days_before_expiry, config.certificate_validity_days
            ),
        ));
    }

    trace!(domain_count = config.domains.len(), "Configuration semantics validated");
    Ok(())
}
