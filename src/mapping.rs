//! Mapping between host storage coordinates and Vault KV coordinates.
//!
//! Two independent strategy axes compose here:
//!
//! - [`KvVersion`] controls the request-path rewrite (`data`/`metadata`
//!   segments) and the one-level `data` nesting of KV v2 bodies.
//! - [`StorageBehaviour`] controls the envelope schema: the reserved-field
//!   convention used by the host's key-storage taxonomy, or raw key/value
//!   pass-through.
//!
//! Keeping the axes orthogonal means every version/behaviour combination is
//! exercised through the same two code paths instead of four special cases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};
use crate::store::{EntryKind, StorageEntry};

/// Key/value secret-engine wire-format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    /// Flat envelopes, mount path addressed directly.
    V1,
    /// Versioned writes; `data`/`metadata` path segments and an extra
    /// `data` nesting level in request/response bodies.
    V2,
}

impl KvVersion {
    /// Parses the configuration surface value (`"1"` or `"2"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Self::V1),
            "2" => Some(Self::V2),
            _ => None,
        }
    }
}

/// Convention governing how a storage entry is packed into a KV envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBehaviour {
    /// Reserved-field schema mirroring the host's content-type taxonomy.
    Rundeck,
    /// Unconstrained pass-through keyed by the content-type label.
    Vault,
}

impl StorageBehaviour {
    /// Parses the configuration surface value (`"rundeck"` or `"vault"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "rundeck" => Some(Self::Rundeck),
            "vault" => Some(Self::Vault),
            _ => None,
        }
    }
}

/// The content-type taxonomy recognized by the reserved-field schema.
///
/// Each kind owns one reserved envelope field; exactly one of them is
/// populated in a well-formed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Password,
    PrivateKey,
    PublicKey,
    Certificate,
}

impl KeyKind {
    /// All kinds, in reserved-field scan order.
    pub const ALL: [KeyKind; 4] =
        [KeyKind::Password, KeyKind::PrivateKey, KeyKind::PublicKey, KeyKind::Certificate];

    /// Reserved envelope field owned by this kind.
    pub const fn field(self) -> &'static str {
        match self {
            KeyKind::Password => "password",
            KeyKind::PrivateKey => "private-key",
            KeyKind::PublicKey => "public-key",
            KeyKind::Certificate => "certificate",
        }
    }

    /// Canonical content-type label reconstructed on reads.
    pub const fn content_type(self) -> &'static str {
        match self {
            KeyKind::Password => "application/x-rundeck-data-password",
            KeyKind::PrivateKey => "application/octet-stream",
            KeyKind::PublicKey => "application/pgp-keys",
            KeyKind::Certificate => "application/x-pem-file",
        }
    }

    /// Resolves a content-type label to a kind. Accepts both the canonical
    /// labels and the bare reserved-field names.
    pub fn from_content_type(label: &str) -> Option<Self> {
        KeyKind::ALL
            .into_iter()
            .find(|kind| kind.content_type() == label || kind.field() == label)
    }
}

/// Wire-level key/value payload exchanged with the secret engine.
///
/// Ordered map so serialized envelopes are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretEnvelope(BTreeMap<String, String>);

impl SecretEnvelope {
    /// Creates an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Looks up a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for SecretEnvelope {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Translates host storage paths and entries into secret-engine coordinates
/// and envelopes, for one fixed version/behaviour combination.
#[derive(Debug, Clone)]
pub struct PathMapper {
    mount: String,
    prefix: String,
    namespace: Option<String>,
    engine: KvVersion,
    behaviour: StorageBehaviour,
}

impl PathMapper {
    /// Creates a mapper for the given mount/prefix/namespace and strategy
    /// selectors.
    pub fn new(
        mount: impl Into<String>,
        prefix: impl Into<String>,
        namespace: Option<String>,
        engine: KvVersion,
        behaviour: StorageBehaviour,
    ) -> Self {
        Self {
            mount: normalize(&mount.into()).to_string(),
            prefix: normalize(&prefix.into()).to_string(),
            namespace: namespace.map(|ns| normalize(&ns).to_string()).filter(|ns| !ns.is_empty()),
            engine,
            behaviour,
        }
    }

    /// Active engine version.
    pub fn engine(&self) -> KvVersion {
        self.engine
    }

    /// Active storage behaviour.
    pub fn behaviour(&self) -> StorageBehaviour {
        self.behaviour
    }

    /// Logical secret path under the mount: `[{namespace}/]{prefix}/{path}`.
    pub fn remote_path(&self, host_path: &str) -> String {
        let mut segments: Vec<&str> = Vec::with_capacity(3);
        if let Some(ns) = &self.namespace {
            segments.push(ns);
        }
        if !self.prefix.is_empty() {
            segments.push(&self.prefix);
        }
        let host_path = normalize(host_path);
        if !host_path.is_empty() {
            segments.push(host_path);
        }
        segments.join("/")
    }

    /// Request path (under `/v1/`) for reads and writes.
    pub fn data_path(&self, host_path: &str) -> String {
        match self.engine {
            KvVersion::V1 => format!("{}/{}", self.mount, self.remote_path(host_path)),
            KvVersion::V2 => format!("{}/data/{}", self.mount, self.remote_path(host_path)),
        }
    }

    /// Request path (under `/v1/`) for listings.
    pub fn list_path(&self, host_path: &str) -> String {
        match self.engine {
            KvVersion::V1 => format!("{}/{}", self.mount, self.remote_path(host_path)),
            KvVersion::V2 => format!("{}/metadata/{}", self.mount, self.remote_path(host_path)),
        }
    }

    /// Request path (under `/v1/`) for deletes. KV v2 deletes address the
    /// `metadata` tree so the key disappears rather than gaining a deleted
    /// version marker.
    pub fn delete_path(&self, host_path: &str) -> String {
        match self.engine {
            KvVersion::V1 => format!("{}/{}", self.mount, self.remote_path(host_path)),
            KvVersion::V2 => format!("{}/metadata/{}", self.mount, self.remote_path(host_path)),
        }
    }

    /// Packs a storage entry into a wire envelope under the active
    /// behaviour.
    pub fn to_envelope(&self, entry: &StorageEntry) -> Result<SecretEnvelope> {
        if entry.kind == EntryKind::Directory {
            return Err(StorageError::mapping(&entry.path, "directories carry no content"));
        }
        let content_type = entry
            .content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .ok_or_else(|| StorageError::mapping(&entry.path, "content entry has no content-type"))?;
        let content = std::str::from_utf8(&entry.content)
            .map_err(|_| StorageError::mapping(&entry.path, "content is not valid UTF-8"))?;

        let mut envelope = SecretEnvelope::new();
        match self.behaviour {
            StorageBehaviour::Rundeck => {
                let kind = KeyKind::from_content_type(content_type).ok_or_else(|| {
                    StorageError::mapping(
                        &entry.path,
                        format!("unrecognized content-type '{content_type}'"),
                    )
                })?;
                envelope.insert(kind.field(), content);
            }
            StorageBehaviour::Vault => {
                envelope.insert(content_type, content);
            }
        }
        Ok(envelope)
    }

    /// Reconstructs a storage entry from a wire envelope under the active
    /// behaviour.
    pub fn from_envelope(&self, host_path: &str, envelope: &SecretEnvelope) -> Result<StorageEntry> {
        match self.behaviour {
            StorageBehaviour::Rundeck => {
                let mut populated = KeyKind::ALL
                    .into_iter()
                    .filter_map(|kind| envelope.get(kind.field()).map(|value| (kind, value)));
                let (kind, value) = populated.next().ok_or_else(|| {
                    StorageError::mapping(host_path, "no reserved field populated")
                })?;
                if populated.next().is_some() {
                    return Err(StorageError::mapping(
                        host_path,
                        "multiple reserved fields populated",
                    ));
                }
                Ok(StorageEntry::content(host_path, kind.content_type(), value.as_bytes()))
            }
            StorageBehaviour::Vault => {
                let mut entries = envelope.iter();
                let (content_type, value) = entries
                    .next()
                    .ok_or_else(|| StorageError::mapping(host_path, "empty envelope"))?;
                if entries.next().is_some() {
                    return Err(StorageError::mapping(
                        host_path,
                        "envelope holds more than one value; cannot infer content-type",
                    ));
                }
                Ok(StorageEntry::content(host_path, content_type, value.as_bytes()))
            }
        }
    }

    /// JSON request body for a write. KV v2 nests the envelope one level
    /// under `data`.
    pub fn write_body(&self, envelope: &SecretEnvelope) -> serde_json::Value {
        match self.engine {
            KvVersion::V1 => serde_json::json!(envelope),
            KvVersion::V2 => serde_json::json!({ "data": envelope }),
        }
    }

    /// Extracts the envelope from a read-response body, unwrapping the
    /// engine-version nesting.
    pub fn read_envelope(&self, host_path: &str, body: &serde_json::Value) -> Result<SecretEnvelope> {
        let data = match self.engine {
            KvVersion::V1 => body.get("data"),
            KvVersion::V2 => body.get("data").and_then(|outer| outer.get("data")),
        };
        let fields = data.and_then(serde_json::Value::as_object).ok_or_else(|| {
            StorageError::mapping(host_path, "response body carries no secret data")
        })?;

        fields
            .iter()
            .map(|(field, value)| {
                let value = value.as_str().ok_or_else(|| {
                    StorageError::mapping(
                        host_path,
                        format!("field '{field}' holds a non-string value"),
                    )
                })?;
                Ok((field.clone(), value.to_string()))
            })
            .collect()
    }

    /// Extracts child names from a list-response body.
    pub fn list_keys(&self, host_path: &str, body: &serde_json::Value) -> Result<Vec<String>> {
        let keys = body
            .get("data")
            .and_then(|data| data.get("keys"))
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| StorageError::mapping(host_path, "list response carries no keys"))?;

        Ok(keys
            .iter()
            .filter_map(serde_json::Value::as_str)
            .map(str::to_string)
            .collect())
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}
