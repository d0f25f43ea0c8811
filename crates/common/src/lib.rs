//! Common utilities and types for certrelay.
//!
//! - [`domain`]: validated domain names and DNS-01 record naming
//! - [`logging`]: tracing subscriber installation (feature `runtime`)

pub mod domain;
#[cfg(feature = "runtime")]
pub mod logging;

pub use domain::{DomainName, DomainNameError, ACME_CHALLENGE_LABEL};
#[cfg(feature = "runtime")]
pub use logging::{init_tracing, LogSettings, LoggingError};
