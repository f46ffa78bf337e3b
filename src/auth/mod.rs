//! Authentication against the remote secret service.
//!
//! Five mutually exclusive credential strategies, selected once at startup
//! from configuration, each produce a bearer session token:
//!
//! - `token`: the configured token is the session, no remote call
//! - `approle`: role-id + secret-id POSTed to the AppRole login endpoint
//! - `cert`: client certificate presented during the TLS handshake, empty
//!   login body
//! - `userpass`: password POSTed to the userpass login endpoint
//! - `github`: personal token POSTed to the GitHub login endpoint
//!
//! The session cache is shared mutable state: [`Authenticator::current_token`]
//! holds one lock across the check-login-replace sequence, so concurrent
//! callers observe at most one in-flight login and reuse its result.

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::errors::{Result, StorageError};
use crate::transport::Transport;
use crate::types::SecretString;

/// Credential strategy for obtaining a session token. Selected once at
/// startup and never changed at runtime.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Static token used verbatim as the session.
    Token { token: SecretString },
    /// AppRole login, optionally under a custom auth mount.
    AppRole { role_id: String, secret_id: SecretString, mount: String },
    /// TLS client-certificate login; the identity itself is configured on
    /// the transport.
    Cert,
    /// Username/password login (also serves LDAP-style deployments).
    UserPass { username: String, password: SecretString },
    /// GitHub personal-token login.
    Github { token: SecretString },
}

impl AuthMethod {
    /// Backend name as it appears on the configuration surface and in
    /// error messages.
    pub fn backend_name(&self) -> &'static str {
        match self {
            AuthMethod::Token { .. } => "token",
            AuthMethod::AppRole { .. } => "approle",
            AuthMethod::Cert => "cert",
            AuthMethod::UserPass { .. } => "userpass",
            AuthMethod::Github { .. } => "github",
        }
    }

    /// Login endpoint (under `/v1/`) and JSON body for remote backends;
    /// `None` for the static token backend.
    fn login_request(&self) -> Option<(String, serde_json::Value)> {
        match self {
            AuthMethod::Token { .. } => None,
            AuthMethod::AppRole { role_id, secret_id, mount } => Some((
                format!("auth/{mount}/login"),
                serde_json::json!({
                    "role_id": role_id,
                    "secret_id": secret_id.expose_secret(),
                }),
            )),
            AuthMethod::Cert => Some(("auth/cert/login".to_string(), serde_json::json!({}))),
            AuthMethod::UserPass { username, password } => Some((
                format!("auth/userpass/login/{username}"),
                serde_json::json!({ "password": password.expose_secret() }),
            )),
            AuthMethod::Github { token } => Some((
                "auth/github/login".to_string(),
                serde_json::json!({ "token": token.expose_secret() }),
            )),
        }
    }

    /// Whether a cached session can still be used. Sessions stay valid
    /// until explicitly invalidated; the static token never refreshes to a
    /// different value, but re-login after invalidation is a local no-op
    /// for it.
    fn is_expired(&self, session: &Session) -> bool {
        session.invalidated
    }
}

/// An authentication session: the bearer token plus its validity state.
/// Owned exclusively by the [`Authenticator`]; never handed to the host.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    invalidated: bool,
}

impl Session {
    fn new(token: SecretString) -> Self {
        Self { token, invalidated: false }
    }

    /// The bearer token authorizing remote calls.
    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: Option<String>,
}

/// Produces and caches the session token used to authorize remote calls.
#[derive(Debug)]
pub struct Authenticator {
    method: AuthMethod,
    session: Mutex<Option<Session>>,
}

impl Authenticator {
    /// Creates an authenticator for the configured method with an empty
    /// session cache.
    pub fn new(method: AuthMethod) -> Self {
        Self { method, session: Mutex::new(None) }
    }

    /// Configured backend name.
    pub fn backend_name(&self) -> &'static str {
        self.method.backend_name()
    }

    /// Returns the cached session token, logging in first when the cache
    /// is empty or invalidated.
    ///
    /// The session lock is held across login-and-replace: when N callers
    /// race on an exhausted session, one performs the login and the rest
    /// reuse its result.
    pub async fn current_token(&self, transport: &Transport) -> Result<SecretString> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if !self.method.is_expired(session) {
                return Ok(session.token().clone());
            }
        }

        let session = self.login(transport).await?;
        let token = session.token().clone();
        *guard = Some(session);
        Ok(token)
    }

    /// Marks the cached session as rejected; the next
    /// [`current_token`](Self::current_token) call re-authenticates.
    pub async fn invalidate(&self) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_mut() {
            tracing::warn!(backend = self.method.backend_name(), "Invalidating rejected session");
            session.invalidated = true;
        }
    }

    async fn login(&self, transport: &Transport) -> Result<Session> {
        let backend = self.method.backend_name();
        let Some((path, body)) = self.method.login_request() else {
            let AuthMethod::Token { token } = &self.method else {
                return Err(StorageError::auth(backend, None, "backend has no login strategy"));
            };
            return Ok(Session::new(token.clone()));
        };

        tracing::debug!(backend, endpoint = %path, "Logging in to auth backend");
        let url = transport.api_url(&path);
        let response = transport
            .send_with_retry("login", |client| client.post(url.clone()).json(&body))
            .await
            .map_err(|e| match e {
                StorageError::Remote { status, attempts, message } => StorageError::auth(
                    backend,
                    status,
                    format!("login failed after {attempts} attempt(s): {message}"),
                ),
                other => other,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(backend, status = status.as_u16(), "Login rejected");
            return Err(StorageError::auth(
                backend,
                Some(status.as_u16()),
                "login rejected by server",
            ));
        }

        let parsed: LoginResponse = response.json().await.map_err(|e| {
            StorageError::auth(backend, Some(status.as_u16()), format!("malformed login response: {e}"))
        })?;
        let token = parsed
            .auth
            .and_then(|auth| auth.client_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                StorageError::auth(
                    backend,
                    Some(status.as_u16()),
                    "login response carries no client token",
                )
            })?;

        tracing::info!(backend, "Authenticated with secret service");
        Ok(Session::new(SecretString::from(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_backend_has_no_login_endpoint() {
        let method = AuthMethod::Token { token: SecretString::new("t") };
        assert!(method.login_request().is_none());
        assert_eq!(method.backend_name(), "token");
    }

    #[test]
    fn test_approle_login_request() {
        let method = AuthMethod::AppRole {
            role_id: "role-1".to_string(),
            secret_id: SecretString::new("sec-1"),
            mount: "approle".to_string(),
        };
        let (path, body) = method.login_request().unwrap();
        assert_eq!(path, "auth/approle/login");
        assert_eq!(body, serde_json::json!({"role_id": "role-1", "secret_id": "sec-1"}));
    }

    #[test]
    fn test_approle_login_request_custom_mount() {
        let method = AuthMethod::AppRole {
            role_id: "r".to_string(),
            secret_id: SecretString::new("s"),
            mount: "batch-approle".to_string(),
        };
        let (path, _) = method.login_request().unwrap();
        assert_eq!(path, "auth/batch-approle/login");
    }

    #[test]
    fn test_userpass_login_request_embeds_username_in_path() {
        let method = AuthMethod::UserPass {
            username: "deploy".to_string(),
            password: SecretString::new("hunter2"),
        };
        let (path, body) = method.login_request().unwrap();
        assert_eq!(path, "auth/userpass/login/deploy");
        assert_eq!(body, serde_json::json!({"password": "hunter2"}));
    }

    #[test]
    fn test_github_login_request() {
        let method = AuthMethod::Github { token: SecretString::new("gh-token") };
        let (path, body) = method.login_request().unwrap();
        assert_eq!(path, "auth/github/login");
        assert_eq!(body, serde_json::json!({"token": "gh-token"}));
    }

    #[test]
    fn test_cert_login_request_has_empty_body() {
        let (path, body) = AuthMethod::Cert.login_request().unwrap();
        assert_eq!(path, "auth/cert/login");
        assert_eq!(body, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_static_token_needs_no_transport_call() {
        let settings = crate::config::Settings::resolve(
            &[("token".to_string(), "root-token".to_string())].into_iter().collect(),
        )
        .unwrap();
        let transport = Transport::build(&settings).unwrap();
        let authenticator = Authenticator::new(settings.auth.clone());

        let token = authenticator.current_token(&transport).await.unwrap();
        assert_eq!(token.expose_secret(), "root-token");

        // Invalidation re-issues the same configured token.
        authenticator.invalidate().await;
        let token = authenticator.current_token(&transport).await.unwrap();
        assert_eq!(token.expose_secret(), "root-token");
    }
}
