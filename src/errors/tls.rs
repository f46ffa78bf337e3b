use std::path::PathBuf;

use thiserror::Error;

/// TLS-specific error variants surfaced while loading trust and identity
/// material during transport construction.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A configured trust file could not be read.
    #[error("Failed to read trust material at {path}: {source}")]
    TrustReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The trust file did not contain a parseable certificate.
    #[error("Trust file {path} is not a valid certificate store: {source}")]
    InvalidTrustMaterial {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A configured client identity file could not be read.
    #[error("Failed to read client identity at {path}: {source}")]
    IdentityReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The identity material did not yield a usable certificate/key pair.
    #[error("Client identity at {path} is not a valid certificate/key pair: {source}")]
    InvalidIdentity {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Password-protected key stores cannot be opened by the rustls-backed
    /// transport; identity material must be an unencrypted PEM bundle.
    #[error("Key store {path} is password-protected; unencrypted PEM material is required")]
    EncryptedKeyStore { path: PathBuf },

    /// The underlying HTTP client rejected the assembled TLS configuration.
    #[error("Failed to assemble TLS client configuration: {source}")]
    ClientBuildError {
        #[source]
        source: anyhow::Error,
    },
}
