//! HTTP transport construction and the shared retry loop.
//!
//! Builds the TLS-configured [`reqwest::Client`] from resolved settings and
//! exposes [`Transport::send_with_retry`], the single code path through
//! which the authenticator and the store adapter issue remote calls.
//! Transient failures (connect errors, timeouts, 5xx) are retried up to the
//! configured attempt budget with a fixed interval; every other response is
//! handed back to the caller for status-specific handling.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::{Certificate, Client, ClientBuilder, Identity, RequestBuilder, Response};
use url::Url;

use crate::config::{Settings, TlsSettings};
use crate::errors::{Result, StorageError, TlsError};

/// Bounded fixed-interval retry policy applied uniformly to remote calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Creates a policy with a total attempt budget and a fixed pause
    /// between attempts. The budget is clamped to at least one attempt.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), interval }
    }

    /// Total attempt budget (first try included).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between consecutive attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// TLS-configured HTTP client plus the retry policy shared by all remote
/// calls.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base: Url,
    retry: RetryPolicy,
}

impl Transport {
    /// Builds the transport from resolved settings.
    ///
    /// # Errors
    ///
    /// [`StorageError::Tls`] when configured trust or identity material
    /// cannot be read or parsed.
    pub fn build(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(settings.open_timeout)
            .timeout(settings.read_timeout);

        builder = apply_trust(builder, &settings.tls)?;
        if let Some(identity) = load_identity(&settings.tls)? {
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| TlsError::ClientBuildError { source: anyhow::Error::new(e) })?;

        Ok(Self {
            client,
            base: settings.address.clone(),
            retry: RetryPolicy::new(settings.max_retries, settings.retry_interval),
        })
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The retry policy shared by every remote call.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Absolute URL for an API path under the server's `/v1/` root.
    pub fn api_url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let full = format!("{}/v1/{}", url.path().trim_end_matches('/'), path.trim_start_matches('/'));
        url.set_path(&full);
        url
    }

    /// Sends a request, retrying transient failures.
    ///
    /// `build` is invoked once per attempt (request bodies are not
    /// reusable across sends). Responses with non-5xx statuses are returned
    /// as-is; status-specific mapping is the caller's concern.
    ///
    /// # Errors
    ///
    /// [`StorageError::Remote`] carrying the last observed status/cause
    /// once the attempt budget is exhausted.
    pub async fn send_with_retry<F>(&self, label: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempts = self.retry.max_attempts();
        let mut last_status = None;
        let mut last_cause = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.interval()).await;
            }

            match build(&self.client).send().await {
                Ok(response) if response.status().is_server_error() => {
                    let status = response.status();
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts = attempts,
                        status = status.as_u16(),
                        "Server error, will retry"
                    );
                    last_status = Some(status.as_u16());
                    last_cause = format!("server returned {status}");
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Transport failure, will retry"
                    );
                    last_status = e.status().map(|s| s.as_u16());
                    last_cause = e.to_string();
                }
            }
        }

        tracing::error!(
            operation = label,
            attempts,
            status = last_status,
            "Retries exhausted"
        );
        Err(StorageError::remote(last_status, attempts, last_cause))
    }
}

fn apply_trust(mut builder: ClientBuilder, tls: &TlsSettings) -> Result<ClientBuilder> {
    if !tls.verify_ssl {
        tracing::warn!(
            "SSL verification disabled; accepting untrusted server certificates"
        );
        return Ok(builder.danger_accept_invalid_certs(true));
    }

    // Precedence: trust store bundle, then single CA certificate, then the
    // system roots. Sources are not merged.
    if let Some(path) = &tls.trust_store_file {
        if tls.ca_pem_file.is_some() {
            tracing::debug!(
                trust_store = %path.display(),
                "Both trust store and CA certificate configured; using the trust store"
            );
        }
        for certificate in load_cert_bundle(path)? {
            builder = builder.add_root_certificate(certificate);
        }
    } else if let Some(path) = &tls.ca_pem_file {
        let pem = fs::read(path)
            .map_err(|source| TlsError::TrustReadError { path: path.clone(), source })?;
        let certificate = Certificate::from_pem(&pem).map_err(|e| TlsError::InvalidTrustMaterial {
            path: path.clone(),
            source: anyhow::Error::new(e),
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    Ok(builder)
}

fn load_cert_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let pem = fs::read(path)
        .map_err(|source| TlsError::TrustReadError { path: path.to_path_buf(), source })?;
    let certificates = Certificate::from_pem_bundle(&pem).map_err(|e| {
        TlsError::InvalidTrustMaterial { path: path.to_path_buf(), source: anyhow::Error::new(e) }
    })?;
    if certificates.is_empty() {
        return Err(TlsError::InvalidTrustMaterial {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("no certificates found in file"),
        }
        .into());
    }
    Ok(certificates)
}

fn load_identity(tls: &TlsSettings) -> Result<Option<Identity>> {
    if let Some(path) = &tls.key_store_file {
        if tls.key_store_password.as_ref().is_some_and(|p| !p.is_empty()) {
            return Err(TlsError::EncryptedKeyStore { path: path.clone() }.into());
        }
        let pem = fs::read(path)
            .map_err(|source| TlsError::IdentityReadError { path: path.clone(), source })?;
        let identity = Identity::from_pem(&pem).map_err(|e| TlsError::InvalidIdentity {
            path: path.clone(),
            source: anyhow::Error::new(e),
        })?;
        return Ok(Some(identity));
    }

    if let (Some(cert_path), Some(key_path)) = (&tls.client_pem_file, &tls.client_key_pem_file) {
        let mut pem = fs::read(cert_path)
            .map_err(|source| TlsError::IdentityReadError { path: cert_path.clone(), source })?;
        let key = fs::read(key_path)
            .map_err(|source| TlsError::IdentityReadError { path: key_path.clone(), source })?;
        pem.push(b'\n');
        pem.extend_from_slice(&key);
        let identity = Identity::from_pem(&pem).map_err(|e| TlsError::InvalidIdentity {
            path: cert_path.clone(),
            source: anyhow::Error::new(e),
        })?;
        return Ok(Some(identity));
    }

    Ok(None)
}
