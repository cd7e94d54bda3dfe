//! Common types shared by the verifier, trust stores, probes and workflow.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Isolation scope (site, tenant) under which trust records and repository
/// configurations are partitioned. `Namespace::global()` is the unnamed scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Option<String>);

impl Namespace {
    pub fn global() -> Self {
        Self(None)
    }

    /// Named scope, with surrounding whitespace dropped. An empty or blank
    /// name is the global scope.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.trim() {
            "" => Self(None),
            trimmed if trimmed.len() == name.len() => Self(Some(name)),
            trimmed => Self(Some(trimmed.to_string())),
        }
    }

    pub fn from_option(name: Option<&str>) -> Self {
        name.map(Self::named).unwrap_or_default()
    }

    pub fn is_global(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "<global>"),
        }
    }
}

/// Opaque secret. Never printed, never serialized.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "Secret(<empty>)")
        } else {
            write!(f, "Secret(***)")
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where a repository lives and how to log in to it.
///
/// Immutable input to a single verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    /// Primary connection string or URL.
    pub path: String,
    /// Login name. Empty means "let the backend decide".
    pub username: String,
    /// Password or token. Empty when key-based auth is used.
    pub password: Secret,
}

impl RepositoryLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            username: String::new(),
            password: Secret::default(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = password.into();
        self
    }
}

/// Raw SSH public key material as offered by a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostKey {
    /// Key algorithm, e.g. `ssh-ed25519`.
    pub algorithm: String,
    /// Wire-format public key blob.
    #[serde(serialize_with = "serialize_b64", deserialize_with = "deserialize_b64")]
    pub key: Vec<u8>,
}

impl HostKey {
    pub fn new(algorithm: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: algorithm.into(),
            key: key.into(),
        }
    }

    /// Parse the `algorithm base64` pair used by known_hosts and ssh-keyscan.
    pub fn from_openssh(algorithm: &str, encoded: &str) -> Result<Self, base64::DecodeError> {
        let key = STANDARD.decode(encoded.trim())?;
        Ok(Self::new(algorithm.trim(), key))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.key)
    }

    /// OpenSSH-style `SHA256:` fingerprint.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.key);
        format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.algorithm, self.to_base64())
    }
}

fn serialize_b64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn deserialize_b64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// Validity window of a certificate, as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub from: String,
    pub until: String,
}

/// A server certificate that failed verification during a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub fingerprint: String,
    pub hostname: String,
    pub issuer: String,
    pub valid: Validity,
    /// Validation failures observed by the backend (e.g. "self-signed").
    #[serde(default)]
    pub failures: Vec<String>,
}

/// Standing record of an accepted certificate. Returned to the workflow so
/// it can be saved alongside the repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub fingerprint: String,
    pub hostname: String,
    pub issuer: String,
    pub valid: Validity,
    /// Failures that were accepted along with the certificate.
    #[serde(default)]
    pub failures: Vec<String>,
    pub accepted_at: DateTime<Utc>,
}

impl CertificateMetadata {
    pub fn accepted_now(certificate: &Certificate) -> Self {
        Self {
            fingerprint: certificate.fingerprint.clone(),
            hostname: certificate.hostname.clone(),
            issuer: certificate.issuer.clone(),
            valid: certificate.valid.clone(),
            failures: certificate.failures.clone(),
            accepted_at: Utc::now(),
        }
    }
}

/// Caller policy for unknown or changed host keys and certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustDecision {
    pub auto_trust: bool,
}

impl TrustDecision {
    pub fn prompt() -> Self {
        Self { auto_trust: false }
    }

    pub fn auto() -> Self {
        Self { auto_trust: true }
    }
}

impl From<bool> for TrustDecision {
    fn from(auto_trust: bool) -> Self {
        Self { auto_trust }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_blank_is_global() {
        assert!(Namespace::named("").is_global());
        assert!(Namespace::named("   ").is_global());
        assert!(Namespace::from_option(None).is_global());
        assert_eq!(Namespace::named("site-a").as_deref(), Some("site-a"));
        assert_eq!(Namespace::named("  site-a\n"), Namespace::named("site-a"));
        assert_eq!(Namespace::global().to_string(), "<global>");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");

        let location = RepositoryLocation::new("ssh://git@example.com/repo.git")
            .with_username("git")
            .with_password("hunter2");
        assert!(!format!("{:?}", location).contains("hunter2"));
    }

    #[test]
    fn test_host_key_openssh_round_trip() {
        let key = HostKey::new("ssh-ed25519", vec![0, 0, 0, 11, 1, 2, 3]);
        let parsed = HostKey::from_openssh("ssh-ed25519", &key.to_base64()).unwrap();
        assert_eq!(parsed, key);
        assert!(key.fingerprint().starts_with("SHA256:"));
        assert!(!key.fingerprint().ends_with('='));
    }

    #[test]
    fn test_host_key_rejects_bad_base64() {
        assert!(HostKey::from_openssh("ssh-rsa", "not base64!").is_err());
    }

    #[test]
    fn test_host_key_serializes_as_base64() {
        let key = HostKey::new("ssh-rsa", vec![1, 2, 3]);
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["algorithm"], "ssh-rsa");
        assert_eq!(json["key"], "AQID");
        let back: HostKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }
}
