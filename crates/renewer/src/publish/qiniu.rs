//! Qiniu CDN publisher
//!
//! Uploads the certificate to the Qiniu SSL certificate store, then points
//! the CDN domain's HTTPS configuration at it. Requests are authorized with
//! a QBox management token computed per request.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::Local;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tracing::{debug, info};
use url::Url;

use certrelay_common::DomainName;
use certrelay_config::QiniuConfig;

use super::{CertificatePublisher, PublishError, PublishReceipt};
use crate::acme::ArtifactPaths;

type HmacSha1 = Hmac<Sha1>;

const UPLOAD_STEP: &str = "certificate upload";
const BIND_STEP: &str = "HTTPS config update";

/// Qiniu CDN publisher
pub struct QiniuPublisher {
    client: Client,
    api_base: String,
    access_key: String,
    secret_key: String,
    force_https: bool,
    timeout: Duration,
}

impl QiniuPublisher {
    /// Create a new publisher
    pub fn new(config: &QiniuConfig, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PublishError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            force_https: config.force_https,
            timeout,
        })
    }

    /// QBox management token for a request URL
    ///
    /// Signs `<path>[?<query>]\n`; bodies are JSON and not part of the signature.
    fn qbox_token(&self, url: &Url) -> Result<String, PublishError> {
        let mut signing = url.path().to_string();
        if let Some(query) = url.query() {
            signing.push('?');
            signing.push_str(query);
        }
        signing.push('\n');

        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| PublishError::Configuration(format!("Invalid secret key: {}", e)))?;
        mac.update(signing.as_bytes());
        let sign = URL_SAFE.encode(mac.finalize().into_bytes());

        Ok(format!("{}:{}", self.access_key, sign))
    }

    fn endpoint(&self, path: &str, step: &'static str) -> Result<Url, PublishError> {
        Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| PublishError::Configuration(format!("Bad {} URL: {}", step, e)))
    }

    /// Send an authorized JSON request; anything but 200 is an error
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        step: &'static str,
    ) -> Result<String, PublishError> {
        let token = self.qbox_token(&url)?;

        let response = self
            .client
            .request(method, url)
            .header("Authorization", format!("QBox {}", token))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Timeout {
                        step,
                        elapsed_secs: self.timeout.as_secs(),
                    }
                } else {
                    PublishError::Network {
                        step,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| PublishError::Network {
            step,
            message: e.to_string(),
        })?;

        if status != StatusCode::OK {
            return Err(PublishError::Status {
                step,
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    /// Upload the certificate, returning its ID
    async fn upload(
        &self,
        domain: &DomainName,
        cert_name: &str,
        fullchain: &str,
        private_key: &str,
    ) -> Result<String, PublishError> {
        let url = self.endpoint("/sslcert", UPLOAD_STEP)?;
        let body = UploadRequest {
            name: cert_name,
            common_name: domain.as_str(),
            pri: private_key,
            ca: fullchain,
        };

        let text = self.send(Method::POST, url, &body, UPLOAD_STEP).await?;
        let response: UploadResponse =
            serde_json::from_str(&text).map_err(|e| PublishError::InvalidResponse {
                step: UPLOAD_STEP,
                message: e.to_string(),
            })?;

        match response.cert_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(PublishError::InvalidResponse {
                step: UPLOAD_STEP,
                message: format!("missing certID in {}", text),
            }),
        }
    }

    /// Point the CDN domain's HTTPS configuration at a certificate
    async fn bind(&self, domain: &DomainName, cert_id: &str) -> Result<(), PublishError> {
        let url = self.endpoint(&format!("/domain/{}/httpsconf", domain), BIND_STEP)?;
        let body = HttpsConfRequest {
            certid: cert_id,
            force_https: self.force_https,
        };

        self.send(Method::PUT, url, &body, BIND_STEP).await?;
        Ok(())
    }
}

impl std::fmt::Debug for QiniuPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QiniuPublisher")
            .field("api_base", &self.api_base)
            .field("access_key", &self.access_key)
            .field("force_https", &self.force_https)
            .finish()
    }
}

#[async_trait]
impl CertificatePublisher for QiniuPublisher {
    fn name(&self) -> &'static str {
        "qiniu"
    }

    async fn publish(
        &self,
        domain: &DomainName,
        artifacts: &ArtifactPaths,
    ) -> Result<PublishReceipt, PublishError> {
        let fullchain = read_artifact(&artifacts.fullchain).await?;
        let private_key = read_artifact(&artifacts.key).await?;
        debug!(domain = %domain, dir = %artifacts.dir.display(), "Certificate files read");

        let cert_name = format!("{}_{}", domain, Local::now().format("%Y%m%d%H%M%S"));

        info!(domain = %domain, cert_name = %cert_name, "Uploading certificate to Qiniu");
        let cert_id = self
            .upload(domain, &cert_name, &fullchain, &private_key)
            .await?;
        info!(domain = %domain, cert_id = %cert_id, "Certificate uploaded");

        self.bind(domain, &cert_id).await?;
        info!(
            domain = %domain,
            cert_id = %cert_id,
            force_https = self.force_https,
            "CDN HTTPS configuration updated"
        );

        Ok(PublishReceipt { cert_id, cert_name })
    }
}

async fn read_artifact(path: &std::path::Path) -> Result<String, PublishError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PublishError::ArtifactRead {
            path: path.to_path_buf(),
            source,
        })
}

// Qiniu API types

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    name: &'a str,
    common_name: &'a str,
    pri: &'a str,
    ca: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "certID")]
    cert_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct HttpsConfRequest<'a> {
    certid: &'a str,
    #[serde(rename = "forceHttps")]
    force_https: bool,
}
