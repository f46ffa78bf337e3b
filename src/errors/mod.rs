//! # Error Handling
//!
//! Crate-wide error taxonomy for the storage bridge. Startup failures
//! ([`StorageError::Config`], [`StorageError::Tls`]) prevent the store from
//! becoming ready; everything else is surfaced per operation and leaves the
//! store usable for subsequent calls.

pub mod tls;
pub mod types;

pub use tls::TlsError;
pub use types::{Result, StorageError};
