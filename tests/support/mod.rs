//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use rcgen::{generate_simple_self_signed, CertifiedKey};
use tempfile::TempDir;

/// Builds a property bag pointing the store at a mock server, with fast
/// retry pacing so failure tests stay quick.
pub fn store_properties(address: &str, extra: &[(&str, &str)]) -> HashMap<String, String> {
    let mut properties: HashMap<String, String> = [
        ("address", address),
        ("token", "test-root-token"),
        ("retry_interval_ms", "10"),
        ("open_timeout_secs", "2"),
        ("read_timeout_secs", "5"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (key, value) in extra {
        properties.insert(key.to_string(), value.to_string());
    }
    properties
}

/// Canonical successful login response body.
pub fn login_response(token: &str) -> serde_json::Value {
    serde_json::json!({
        "auth": {
            "client_token": token,
            "lease_duration": 2_764_800,
            "renewable": true
        }
    })
}

/// Ephemeral PEM files generated for TLS transport tests.
pub struct TestCertificateFiles {
    temp_dir: TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl TestCertificateFiles {
    /// Generates a self-signed localhost certificate and private key.
    pub fn localhost() -> Self {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string()])
                .expect("generate test certificate");

        let temp_dir = TempDir::new().expect("create temp dir");
        let cert_path = temp_dir.path().join("cert.pem");
        let key_path = temp_dir.path().join("key.pem");

        fs::write(&cert_path, cert.pem()).expect("write certificate");
        fs::write(&key_path, key_pair.serialize_pem()).expect("write private key");

        Self { temp_dir, cert_path, key_path }
    }

    /// Writes certificate and key into a single identity bundle file.
    pub fn identity_bundle(&self) -> PathBuf {
        let mut bundle = fs::read(&self.cert_path).expect("read certificate");
        bundle.push(b'\n');
        bundle.extend_from_slice(&fs::read(&self.key_path).expect("read key"));

        let path = self.temp_dir.path().join("identity.pem");
        fs::write(&path, bundle).expect("write identity bundle");
        path
    }

    /// Writes a trust bundle containing this certificate twice (two
    /// entries exercise multi-certificate parsing).
    pub fn trust_bundle(&self) -> PathBuf {
        let pem = fs::read_to_string(&self.cert_path).expect("read certificate");
        let path = self.temp_dir.path().join("truststore.pem");
        fs::write(&path, format!("{pem}\n{pem}")).expect("write trust bundle");
        path
    }
}
