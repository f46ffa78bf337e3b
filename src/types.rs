//! Secure wrapper types for credential material.
//!
//! Tokens, passwords and secret-ids flow through configuration, the
//! authenticator and request construction; this module makes sure none of
//! them can leak through `Debug`, `Display`, logging or serialization.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wrapper that redacts its contents everywhere except
/// [`expose_secret`](SecretString::expose_secret).
///
/// - `Debug` prints `SecretString([REDACTED])`
/// - `Display` prints `[REDACTED]`
/// - `Serialize` emits `"[REDACTED]"`, never the value
/// - `Deserialize` accepts real values (settings arrive from the host)
/// - Backing memory is zeroed on drop via the `zeroize` crate
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the underlying value.
    ///
    /// Call sites are the audit surface for secret usage: restrict them to
    /// request construction and never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns the secret's length without exposing it.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the wrapped value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(SecretString(value))
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::new("hvs.CAESIJ");
        let debug_output = format!("{:?}", secret);

        assert_eq!(debug_output, "SecretString([REDACTED])");
        assert!(!debug_output.contains("hvs."));
    }

    #[test]
    fn test_display_is_redacted() {
        let secret = SecretString::new("s3cr3t");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_expose_returns_value() {
        let secret = SecretString::new("root-token");
        assert_eq!(secret.expose_secret(), "root-token");
    }

    #[test]
    fn test_serialization_redacts() {
        let secret = SecretString::new("s3cr3t");
        let json = serde_json::to_string(&secret).unwrap();

        assert_eq!(json, "\"[REDACTED]\"");
        assert!(!json.contains("s3cr3t"));
    }

    #[test]
    fn test_deserialization_accepts_values() {
        let secret: SecretString = serde_json::from_str("\"configured-token\"").unwrap();
        assert_eq!(secret.expose_secret(), "configured-token");
    }

    #[test]
    fn test_equality_and_length() {
        let a = SecretString::new("same");
        let b = SecretString::new("same");
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(!a.is_empty());
        assert!(SecretString::new("").is_empty());
    }
}
