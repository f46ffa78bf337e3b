//! Vault-backed implementation of the key-storage contract.
//!
//! `VaultKeyStore` composes the resolved settings, the TLS transport, the
//! authenticator and the path mapper, and owns the failure-handling loop
//! around each remote call: transient failures are retried by the
//! transport, a rejected session (401/403) triggers exactly one
//! re-authentication before the operation fails, and 404s map to the
//! not-found contract where the operation defines one.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::auth::Authenticator;
use crate::config::Settings;
use crate::errors::{Result, StorageError};
use crate::mapping::PathMapper;
use crate::store::{DirectoryListing, EntryKind, KeyStorage, StorageEntry};
use crate::transport::Transport;

/// Header carrying the session token on every authorized request.
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Key storage provider persisting entries in a Vault KV secret engine.
///
/// Construction is fallible only for configuration and TLS reasons; no
/// remote call is made until the first operation. The store is `Send +
/// Sync` and may be shared across tasks.
#[derive(Debug)]
pub struct VaultKeyStore {
    transport: Transport,
    authenticator: Authenticator,
    mapper: PathMapper,
}

impl VaultKeyStore {
    /// Resolves the host's property bag and constructs the store.
    ///
    /// # Errors
    ///
    /// [`StorageError::Config`] or [`StorageError::Tls`]; both are fatal
    /// and prevent the store from becoming ready.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        Self::new(Settings::resolve(properties)?)
    }

    /// Constructs the store from already-resolved settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let transport = Transport::build(&settings)?;
        let authenticator = Authenticator::new(settings.auth.clone());
        let mapper = PathMapper::new(
            settings.mount.clone(),
            settings.prefix.clone(),
            settings.namespace.clone(),
            settings.engine,
            settings.behaviour,
        );

        tracing::info!(
            address = %settings.address,
            mount = %settings.mount,
            backend = authenticator.backend_name(),
            "Vault key storage ready"
        );
        Ok(Self { transport, authenticator, mapper })
    }

    /// Unauthenticated liveness probe against the server's health
    /// endpoint. Vault answers with non-200 statuses for sealed or standby
    /// nodes; reachability is all this checks.
    pub async fn ping(&self) -> Result<()> {
        let url = self.transport.api_url("sys/health");
        let response =
            self.transport.send_with_retry("health", |client| client.get(url.clone())).await?;
        tracing::debug!(status = response.status().as_u16(), "Health probe answered");
        Ok(())
    }

    /// Issues an authorized request, re-authenticating at most once when
    /// the session is rejected with 401/403.
    async fn call<F>(&self, label: &'static str, build: F) -> Result<Response>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let mut reauthenticated = false;
        loop {
            let token = self.authenticator.current_token(&self.transport).await?;
            let response = self
                .transport
                .send_with_retry(label, |client| build(client, token.expose_secret()))
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                if !reauthenticated {
                    tracing::warn!(
                        operation = label,
                        status = status.as_u16(),
                        "Session rejected; re-authenticating"
                    );
                    self.authenticator.invalidate().await;
                    reauthenticated = true;
                    continue;
                }
                return Err(StorageError::remote(
                    Some(status.as_u16()),
                    2,
                    "session rejected again after re-authentication",
                ));
            }
            return Ok(response);
        }
    }

    async fn json_body(&self, path: &str, response: Response) -> Result<serde_json::Value> {
        let status = response.status();
        response.json().await.map_err(|e| {
            StorageError::remote(Some(status.as_u16()), 1, format!("invalid JSON response for '{path}': {e}"))
        })
    }
}

fn unexpected_status(status: StatusCode) -> StorageError {
    StorageError::remote(Some(status.as_u16()), 1, format!("unexpected status {status}"))
}

#[async_trait]
impl KeyStorage for VaultKeyStore {
    async fn read(&self, path: &str) -> Result<StorageEntry> {
        let url = self.transport.api_url(&self.mapper.data_path(path));
        let response = self
            .call("read", |client, token| client.get(url.clone()).header(TOKEN_HEADER, token))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::not_found(path)),
            status if !status.is_success() => Err(unexpected_status(status)),
            _ => {
                let body = self.json_body(path, response).await?;
                let envelope = self.mapper.read_envelope(path, &body)?;
                let entry = self.mapper.from_envelope(path, &envelope)?;
                tracing::debug!(path, "Read entry");
                Ok(entry)
            }
        }
    }

    async fn write(&self, entry: &StorageEntry) -> Result<()> {
        if entry.kind == EntryKind::Directory {
            return Err(StorageError::mapping(
                &entry.path,
                "directories are implicit; only content entries are written",
            ));
        }

        let envelope = self.mapper.to_envelope(entry)?;
        let body = self.mapper.write_body(&envelope);
        let url = self.transport.api_url(&self.mapper.data_path(&entry.path));
        let response = self
            .call("write", |client, token| {
                client.post(url.clone()).header(TOKEN_HEADER, token).json(&body)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(unexpected_status(status));
        }
        tracing::info!(path = %entry.path, "Stored entry");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.transport.api_url(&self.mapper.delete_path(path));
        let response = self
            .call("delete", |client, token| client.delete(url.clone()).header(TOKEN_HEADER, token))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::not_found(path)),
            status if !status.is_success() => Err(unexpected_status(status)),
            _ => {
                tracing::info!(path, "Deleted entry");
                Ok(())
            }
        }
    }

    async fn list(&self, path_prefix: &str) -> Result<DirectoryListing> {
        let url = self.transport.api_url(&self.mapper.list_path(path_prefix));
        let response = self
            .call("list", |client, token| {
                client.get(url.clone()).query(&[("list", "true")]).header(TOKEN_HEADER, token)
            })
            .await?;

        match response.status() {
            // An absent directory has no children.
            StatusCode::NOT_FOUND => Ok(DirectoryListing::new(Vec::new())),
            status if !status.is_success() => Err(unexpected_status(status)),
            _ => {
                let body = self.json_body(path_prefix, response).await?;
                let names = self.mapper.list_keys(path_prefix, &body)?;
                tracing::debug!(path = path_prefix, children = names.len(), "Listed directory");
                Ok(DirectoryListing::new(names))
            }
        }
    }
}
