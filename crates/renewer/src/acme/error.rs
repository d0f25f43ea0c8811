//! ACME adapter error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while driving acme.sh
#[derive(Debug, Error)]
pub enum AcmeError {
    /// The acme.sh process could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process ran past its deadline and was killed
    #[error("acme.sh did not finish within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// No challenge value could be found in the output
    #[error("No DNS-01 challenge value in acme.sh output for domain '{domain}'")]
    ChallengeNotFound {
        domain: String,
        stdout: String,
        stderr: String,
    },

    /// The completion run exited unsuccessfully
    #[error("Certificate validation failed for domain '{domain}' (exit code {}): {stderr}", describe_exit(.exit_code))]
    ValidationFailed {
        domain: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_display() {
        let err = AcmeError::ValidationFailed {
            domain: "example.com".to_string(),
            exit_code: Some(1),
            stderr: "Verify error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Certificate validation failed for domain 'example.com' (exit code 1): Verify error"
        );

        let err = AcmeError::ValidationFailed {
            domain: "example.com".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("exit code none"));
    }
}
