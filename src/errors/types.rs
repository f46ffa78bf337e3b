//! # Error Types
//!
//! Error taxonomy for key-storage operations against the Vault backend.

use thiserror::Error;

use super::tls::TlsError;

/// Result type for storage-bridge operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the storage bridge.
///
/// `Config` and `Tls` are fatal at construction time. The remaining variants
/// are returned per operation; none of them poison the store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Missing or malformed settings, detected before any remote call.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Certificate or key material could not be loaded.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Login against the configured auth backend was rejected or returned
    /// a malformed response.
    #[error("Authentication failed for backend '{backend}': {message}")]
    Auth { backend: String, status: Option<u16>, message: String },

    /// The stored envelope does not match the schema expected under the
    /// active storage behaviour. Indicates a data/config mismatch, so it is
    /// never retried.
    #[error("Secret envelope mismatch at '{path}': {reason}")]
    Mapping { path: String, reason: String },

    /// The remote path does not exist.
    #[error("Key not found: {path}")]
    NotFound { path: String },

    /// A remote call kept failing after the configured retries.
    #[error("Vault request failed after {attempts} attempt(s): {message}")]
    Remote { status: Option<u16>, attempts: u32, message: String },
}

impl StorageError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an authentication error.
    pub fn auth(backend: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Auth { backend: backend.into(), status, message: message.into() }
    }

    /// Create a mapping error.
    pub fn mapping(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping { path: path.into(), reason: reason.into() }
    }

    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a remote error carrying the last observed status.
    pub fn remote(status: Option<u16>, attempts: u32, message: impl Into<String>) -> Self {
        Self::Remote { status, attempts, message: message.into() }
    }

    /// Last HTTP status observed, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Remote { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = StorageError::not_found("keys/db/password");
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert_eq!(err.to_string(), "Key not found: keys/db/password");

        let err = StorageError::auth("approle", Some(400), "invalid role or secret ID");
        assert!(matches!(err, StorageError::Auth { .. }));
        assert_eq!(err.status(), Some(400));

        let err = StorageError::mapping("keys/a", "no reserved field populated");
        assert!(matches!(err, StorageError::Mapping { .. }));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_remote_error_display() {
        let err = StorageError::remote(Some(503), 5, "service unavailable");
        assert!(err.to_string().contains("after 5 attempt(s)"));
        assert!(err.to_string().contains("service unavailable"));
        assert_eq!(err.status(), Some(503));
    }
}
