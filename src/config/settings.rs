//! # Configuration Settings
//!
//! Resolves the loosely-typed property bag handed over by the host into the
//! immutable [`Settings`] snapshot. Nothing past this module consumes raw
//! properties.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::auth::AuthMethod;
use crate::errors::{Result, StorageError};
use crate::mapping::{KvVersion, StorageBehaviour};
use crate::types::SecretString;

// Property keys exposed on the host's configuration surface.
pub const PROP_ADDRESS: &str = "address";
pub const PROP_PREFIX: &str = "prefix";
pub const PROP_AUTH_BACKEND: &str = "auth_backend";
pub const PROP_TOKEN: &str = "token";
pub const PROP_KEY_STORE_FILE: &str = "key_store_file";
pub const PROP_KEY_STORE_PASSWORD: &str = "key_store_password";
pub const PROP_TRUST_STORE_FILE: &str = "trust_store_file";
pub const PROP_PEM_FILE: &str = "pem_file";
pub const PROP_CLIENT_PEM_FILE: &str = "client_pem_file";
pub const PROP_CLIENT_KEY_PEM_FILE: &str = "client_key_pem_file";
pub const PROP_VERIFY_SSL: &str = "verify_ssl";
pub const PROP_USERNAME: &str = "username";
pub const PROP_PASSWORD: &str = "password";
pub const PROP_APPROLE_ID: &str = "approle_id";
pub const PROP_APPROLE_SECRET_ID: &str = "approle_secret_id";
pub const PROP_APPROLE_AUTH_MOUNT: &str = "approle_auth_mount";
pub const PROP_GITHUB_TOKEN: &str = "github_token";
pub const PROP_MAX_RETRIES: &str = "max_retries";
pub const PROP_RETRY_INTERVAL_MS: &str = "retry_interval_ms";
pub const PROP_OPEN_TIMEOUT_SECS: &str = "open_timeout_secs";
pub const PROP_READ_TIMEOUT_SECS: &str = "read_timeout_secs";
pub const PROP_SECRET_MOUNT: &str = "secret_mount";
pub const PROP_NAMESPACE: &str = "namespace";
pub const PROP_STORAGE_BEHAVIOUR: &str = "storage_behaviour";
pub const PROP_ENGINE_VERSION: &str = "engine_version";

const DEFAULT_ADDRESS: &str = "https://localhost:8200";
const DEFAULT_PREFIX: &str = "rundeck";
const DEFAULT_SECRET_MOUNT: &str = "secret";
const DEFAULT_APPROLE_MOUNT: &str = "approle";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;
const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 5;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 20;

/// TLS trust and identity material resolved from the property bag.
///
/// Trust precedence when several sources are configured:
/// `trust_store_file` (PEM bundle) wins over `pem_file` (single CA
/// certificate), which wins over the system trust store. Sources are never
/// merged.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    /// When false the transport accepts self-signed/untrusted certificates
    /// with no hostname or chain validation. Explicit security downgrade.
    pub verify_ssl: bool,
    /// PEM bundle of trusted server certificates.
    pub trust_store_file: Option<PathBuf>,
    /// Single PEM-encoded CA certificate.
    pub ca_pem_file: Option<PathBuf>,
    /// PEM bundle holding the client certificate and its unencrypted
    /// private key.
    pub key_store_file: Option<PathBuf>,
    /// Password for `key_store_file`. Non-empty values are rejected at
    /// transport construction: the rustls-backed client only consumes
    /// unencrypted PEM material.
    pub key_store_password: Option<SecretString>,
    /// PEM-encoded client certificate (paired with
    /// `client_key_pem_file`).
    pub client_pem_file: Option<PathBuf>,
    /// PEM-encoded client private key.
    pub client_key_pem_file: Option<PathBuf>,
}

impl TlsSettings {
    /// True when any client-identity source is configured.
    pub fn has_client_identity(&self) -> bool {
        self.key_store_file.is_some()
            || (self.client_pem_file.is_some() && self.client_key_pem_file.is_some())
    }
}

/// Immutable snapshot of resolved configuration. Created once at store
/// construction; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub address: Url,
    pub prefix: String,
    pub auth: AuthMethod,
    pub tls: TlsSettings,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub open_timeout: Duration,
    pub read_timeout: Duration,
    pub mount: String,
    pub namespace: Option<String>,
    pub behaviour: StorageBehaviour,
    pub engine: KvVersion,
}

impl Settings {
    /// Validates and normalizes the host's property bag.
    ///
    /// # Errors
    ///
    /// [`StorageError::Config`] when a field required by the selected auth
    /// backend is missing, a selector holds an unrecognized value, or a
    /// numeric property fails to parse.
    pub fn resolve(properties: &HashMap<String, String>) -> Result<Self> {
        let address_raw = get(properties, PROP_ADDRESS).unwrap_or(DEFAULT_ADDRESS);
        let address = Url::parse(address_raw).map_err(|e| {
            StorageError::config(format!("invalid '{PROP_ADDRESS}' value '{address_raw}': {e}"))
        })?;

        let tls = TlsSettings {
            verify_ssl: parse_bool(properties, PROP_VERIFY_SSL, true)?,
            trust_store_file: get(properties, PROP_TRUST_STORE_FILE).map(PathBuf::from),
            ca_pem_file: get(properties, PROP_PEM_FILE).map(PathBuf::from),
            key_store_file: get(properties, PROP_KEY_STORE_FILE).map(PathBuf::from),
            key_store_password: get(properties, PROP_KEY_STORE_PASSWORD).map(SecretString::from),
            client_pem_file: get(properties, PROP_CLIENT_PEM_FILE).map(PathBuf::from),
            client_key_pem_file: get(properties, PROP_CLIENT_KEY_PEM_FILE).map(PathBuf::from),
        };

        let auth = resolve_auth(properties, &tls)?;

        let behaviour_raw = get(properties, PROP_STORAGE_BEHAVIOUR).unwrap_or("rundeck");
        let behaviour = StorageBehaviour::parse(behaviour_raw).ok_or_else(|| {
            StorageError::config(format!(
                "invalid '{PROP_STORAGE_BEHAVIOUR}' value '{behaviour_raw}' (expected 'rundeck' or 'vault')"
            ))
        })?;

        let engine_raw = get(properties, PROP_ENGINE_VERSION).unwrap_or("1");
        let engine = KvVersion::parse(engine_raw).ok_or_else(|| {
            StorageError::config(format!(
                "invalid '{PROP_ENGINE_VERSION}' value '{engine_raw}' (expected '1' or '2')"
            ))
        })?;

        Ok(Self {
            address,
            prefix: get(properties, PROP_PREFIX).unwrap_or(DEFAULT_PREFIX).to_string(),
            auth,
            tls,
            max_retries: parse_u32(properties, PROP_MAX_RETRIES, DEFAULT_MAX_RETRIES)?.max(1),
            retry_interval: Duration::from_millis(parse_u64(
                properties,
                PROP_RETRY_INTERVAL_MS,
                DEFAULT_RETRY_INTERVAL_MS,
            )?),
            open_timeout: Duration::from_secs(parse_u64(
                properties,
                PROP_OPEN_TIMEOUT_SECS,
                DEFAULT_OPEN_TIMEOUT_SECS,
            )?),
            read_timeout: Duration::from_secs(parse_u64(
                properties,
                PROP_READ_TIMEOUT_SECS,
                DEFAULT_READ_TIMEOUT_SECS,
            )?),
            mount: get(properties, PROP_SECRET_MOUNT).unwrap_or(DEFAULT_SECRET_MOUNT).to_string(),
            namespace: get(properties, PROP_NAMESPACE).map(str::to_string),
            behaviour,
            engine,
        })
    }
}

fn resolve_auth(properties: &HashMap<String, String>, tls: &TlsSettings) -> Result<AuthMethod> {
    let backend = get(properties, PROP_AUTH_BACKEND).unwrap_or("token");
    match backend {
        "token" => Ok(AuthMethod::Token {
            token: SecretString::from(required(properties, PROP_TOKEN, backend)?),
        }),
        "approle" => Ok(AuthMethod::AppRole {
            role_id: required(properties, PROP_APPROLE_ID, backend)?.to_string(),
            secret_id: SecretString::from(required(properties, PROP_APPROLE_SECRET_ID, backend)?),
            mount: get(properties, PROP_APPROLE_AUTH_MOUNT)
                .unwrap_or(DEFAULT_APPROLE_MOUNT)
                .to_string(),
        }),
        "cert" => {
            if !tls.has_client_identity() {
                return Err(StorageError::config(format!(
                    "auth backend 'cert' requires '{PROP_KEY_STORE_FILE}' or the \
                     '{PROP_CLIENT_PEM_FILE}'/'{PROP_CLIENT_KEY_PEM_FILE}' pair"
                )));
            }
            Ok(AuthMethod::Cert)
        }
        "userpass" => Ok(AuthMethod::UserPass {
            username: required(properties, PROP_USERNAME, backend)?.to_string(),
            password: SecretString::from(required(properties, PROP_PASSWORD, backend)?),
        }),
        "github" => Ok(AuthMethod::Github {
            token: SecretString::from(required(properties, PROP_GITHUB_TOKEN, backend)?),
        }),
        other => Err(StorageError::config(format!(
            "invalid '{PROP_AUTH_BACKEND}' value '{other}' \
             (expected one of: approle, cert, github, token, userpass)"
        ))),
    }
}

fn get<'a>(properties: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    properties.get(key).map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(
    properties: &'a HashMap<String, String>,
    key: &str,
    backend: &str,
) -> Result<&'a str> {
    get(properties, key).ok_or_else(|| {
        StorageError::config(format!("auth backend '{backend}' requires property '{key}'"))
    })
}

fn parse_bool(properties: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
    match get(properties, key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(StorageError::config(format!(
                "invalid '{key}' value '{raw}' (expected 'true' or 'false')"
            ))),
        },
    }
}

fn parse_u32(properties: &HashMap<String, String>, key: &str, default: u32) -> Result<u32> {
    match get(properties, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| StorageError::config(format!("invalid '{key}' value '{raw}'"))),
    }
}

fn parse_u64(properties: &HashMap<String, String>, key: &str, default: u64) -> Result<u64> {
    match get(properties, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| StorageError::config(format!("invalid '{key}' value '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::resolve(&props(&[(PROP_TOKEN, "root-token")])).unwrap();

        assert_eq!(settings.address.as_str(), "https://localhost:8200/");
        assert_eq!(settings.prefix, "rundeck");
        assert_eq!(settings.mount, "secret");
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.retry_interval, Duration::from_millis(1000));
        assert_eq!(settings.open_timeout, Duration::from_secs(5));
        assert_eq!(settings.read_timeout, Duration::from_secs(20));
        assert_eq!(settings.behaviour, StorageBehaviour::Rundeck);
        assert_eq!(settings.engine, KvVersion::V1);
        assert!(settings.tls.verify_ssl);
        assert!(settings.namespace.is_none());
        assert!(matches!(settings.auth, AuthMethod::Token { .. }));
    }

    #[test]
    fn test_token_backend_requires_token() {
        let err = Settings::resolve(&props(&[(PROP_AUTH_BACKEND, "token")])).unwrap_err();
        assert!(matches!(err, StorageError::Config { .. }));
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_approle_backend() {
        let settings = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "approle"),
            (PROP_APPROLE_ID, "role-1"),
            (PROP_APPROLE_SECRET_ID, "sec-1"),
        ]))
        .unwrap();

        match &settings.auth {
            AuthMethod::AppRole { role_id, mount, .. } => {
                assert_eq!(role_id, "role-1");
                assert_eq!(mount, "approle");
            }
            other => panic!("unexpected auth method: {other:?}"),
        }
    }

    #[test]
    fn test_approle_backend_custom_mount() {
        let settings = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "approle"),
            (PROP_APPROLE_ID, "role-1"),
            (PROP_APPROLE_SECRET_ID, "sec-1"),
            (PROP_APPROLE_AUTH_MOUNT, "batch-approle"),
        ]))
        .unwrap();

        assert!(matches!(settings.auth, AuthMethod::AppRole { ref mount, .. } if mount == "batch-approle"));
    }

    #[test]
    fn test_approle_backend_missing_secret_id() {
        let err = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "approle"),
            (PROP_APPROLE_ID, "role-1"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(PROP_APPROLE_SECRET_ID));
    }

    #[test]
    fn test_userpass_backend() {
        let settings = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "userpass"),
            (PROP_USERNAME, "deploy"),
            (PROP_PASSWORD, "hunter2"),
        ]))
        .unwrap();
        assert!(matches!(settings.auth, AuthMethod::UserPass { ref username, .. } if username == "deploy"));
    }

    #[test]
    fn test_github_backend() {
        let settings = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "github"),
            (PROP_GITHUB_TOKEN, "gh-token"),
        ]))
        .unwrap();
        assert!(matches!(settings.auth, AuthMethod::Github { .. }));
    }

    #[test]
    fn test_cert_backend_requires_identity_material() {
        let err = Settings::resolve(&props(&[(PROP_AUTH_BACKEND, "cert")])).unwrap_err();
        assert!(err.to_string().contains("cert"));

        let settings = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "cert"),
            (PROP_KEY_STORE_FILE, "/etc/vault/client.pem"),
        ]))
        .unwrap();
        assert!(matches!(settings.auth, AuthMethod::Cert));
        assert!(settings.tls.has_client_identity());
    }

    #[test]
    fn test_cert_backend_accepts_pem_pair() {
        let settings = Settings::resolve(&props(&[
            (PROP_AUTH_BACKEND, "cert"),
            (PROP_CLIENT_PEM_FILE, "/etc/vault/client.crt"),
            (PROP_CLIENT_KEY_PEM_FILE, "/etc/vault/client.key"),
        ]))
        .unwrap();
        assert!(settings.tls.has_client_identity());
    }

    #[test]
    fn test_unknown_auth_backend_rejected() {
        let err = Settings::resolve(&props(&[(PROP_AUTH_BACKEND, "ldap")])).unwrap_err();
        assert!(err.to_string().contains("ldap"));
    }

    #[test]
    fn test_unknown_selectors_rejected() {
        let err = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_ENGINE_VERSION, "3"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(PROP_ENGINE_VERSION));

        let err = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_STORAGE_BEHAVIOUR, "consul"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(PROP_STORAGE_BEHAVIOUR));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_MAX_RETRIES, "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(PROP_MAX_RETRIES));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_ADDRESS, "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StorageError::Config { .. }));
    }

    #[test]
    fn test_verify_ssl_parsing() {
        let settings = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_VERIFY_SSL, "FALSE"),
        ]))
        .unwrap();
        assert!(!settings.tls.verify_ssl);

        let err = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_VERIFY_SSL, "yes"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(PROP_VERIFY_SSL));
    }

    #[test]
    fn test_numeric_overrides() {
        let settings = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_MAX_RETRIES, "3"),
            (PROP_RETRY_INTERVAL_MS, "250"),
            (PROP_OPEN_TIMEOUT_SECS, "2"),
            (PROP_READ_TIMEOUT_SECS, "7"),
        ]))
        .unwrap();

        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.retry_interval, Duration::from_millis(250));
        assert_eq!(settings.open_timeout, Duration::from_secs(2));
        assert_eq!(settings.read_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let settings = Settings::resolve(&props(&[
            (PROP_TOKEN, "t"),
            (PROP_PREFIX, "  "),
            (PROP_NAMESPACE, ""),
        ]))
        .unwrap();
        assert_eq!(settings.prefix, "rundeck");
        assert!(settings.namespace.is_none());
    }
}
