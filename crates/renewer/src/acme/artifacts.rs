//! Certificate artifacts written by acme.sh

use std::path::{Path, PathBuf};

use certrelay_common::DomainName;

/// Full chain file name inside a certificate directory
pub const FULLCHAIN_FILE: &str = "fullchain.cer";

/// CA chain file name inside a certificate directory
pub const CA_FILE: &str = "ca.cer";

/// Paths to one domain's certificate artifacts
///
/// acme.sh keeps ECC certificates in `<home>/<domain>_ecc/` and RSA ones in
/// `<home>/<domain>/`; the ECC directory wins when it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub fullchain: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

impl ArtifactPaths {
    /// Resolve the artifact directory for a domain
    pub fn locate(acme_home: &Path, domain: &DomainName) -> Self {
        let ecc_dir = acme_home.join(format!("{}_ecc", domain));
        let dir = if ecc_dir.is_dir() {
            ecc_dir
        } else {
            acme_home.join(domain.as_str())
        };
        Self::in_dir(dir, domain)
    }

    fn in_dir(dir: PathBuf, domain: &DomainName) -> Self {
        Self {
            fullchain: dir.join(FULLCHAIN_FILE),
            key: dir.join(format!("{}.key", domain)),
            ca: dir.join(CA_FILE),
            dir,
        }
    }

    /// Whether the full chain and private key are both present
    pub fn exists(&self) -> bool {
        self.fullchain.is_file() && self.key.is_file()
    }
}
