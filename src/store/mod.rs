//! Host-facing key-storage contract.
//!
//! The host application talks to the bridge exclusively through
//! [`KeyStorage`]: read/write/delete/list over slash-delimited hierarchical
//! paths, exchanging [`StorageEntry`] values. The Vault-backed
//! implementation lives in [`vault`].

pub mod vault;

use async_trait::async_trait;

use crate::errors::Result;

pub use vault::VaultKeyStore;

/// Whether a storage node holds content or only children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Content,
    Directory,
}

/// A single node in the host's hierarchical key storage.
///
/// Directories carry no content and no content-type; content nodes carry
/// raw bytes plus the content-type label the host attached on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Slash-delimited path, unique within a namespace.
    pub path: String,
    pub kind: EntryKind,
    /// Content-type label ("password", private key, ...); `None` for
    /// directories.
    pub content_type: Option<String>,
    /// Raw content bytes; empty for directories.
    pub content: Vec<u8>,
}

impl StorageEntry {
    /// Creates a content entry.
    pub fn content(
        path: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Content,
            content_type: Some(content_type.into()),
            content: content.into(),
        }
    }

    /// Creates a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self { path: path.into(), kind: EntryKind::Directory, content_type: None, content: Vec::new() }
    }
}

/// Lazy, finite, non-restartable sequence of child names produced by
/// [`KeyStorage::list`]. Names ending in `/` denote sub-directories.
#[derive(Debug)]
pub struct DirectoryListing(std::vec::IntoIter<String>);

impl DirectoryListing {
    pub(crate) fn new(names: Vec<String>) -> Self {
        Self(names.into_iter())
    }

    /// Remaining number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the listing has been exhausted (or was empty).
    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }
}

impl Iterator for DirectoryListing {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

/// Pluggable storage-provider contract consumed by the host.
///
/// Implementations may be called from arbitrary tasks; operations on
/// distinct paths are independent. Conflicting writes to the same path are
/// the host's responsibility to serialize.
///
/// # Errors
///
/// Construction-time failures are [`StorageError::Config`] /
/// [`StorageError::Tls`]; per-operation failures are the remaining
/// [`StorageError`] variants and never poison the store.
///
/// [`StorageError`]: crate::errors::StorageError
/// [`StorageError::Config`]: crate::errors::StorageError::Config
/// [`StorageError::Tls`]: crate::errors::StorageError::Tls
#[async_trait]
pub trait KeyStorage: Send + Sync {
    /// Retrieves the entry stored at `path`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] when the path was never written
    /// - [`StorageError::Mapping`] when the stored envelope does not match
    ///   the active storage behaviour
    /// - [`StorageError::Remote`] after the retry budget is exhausted
    ///
    /// [`StorageError::NotFound`]: crate::errors::StorageError::NotFound
    /// [`StorageError::Mapping`]: crate::errors::StorageError::Mapping
    /// [`StorageError::Remote`]: crate::errors::StorageError::Remote
    async fn read(&self, path: &str) -> Result<StorageEntry>;

    /// Stores a content entry at its path, overwriting any previous value.
    /// Under KV v2 each write creates a new version; reads return the
    /// latest.
    async fn write(&self, entry: &StorageEntry) -> Result<()>;

    /// Removes the entry at `path`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] when the path does not exist
    ///
    /// [`StorageError::NotFound`]: crate::errors::StorageError::NotFound
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists the immediate children of `path_prefix`. An absent directory
    /// yields an empty listing.
    async fn list(&self, path_prefix: &str) -> Result<DirectoryListing>;
}
