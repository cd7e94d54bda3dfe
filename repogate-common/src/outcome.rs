//! Verification outcomes.

use crate::errors::ErrorCode;
use crate::types::{Certificate, CertificateMetadata, HostKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one verification call.
///
/// Every case carries what a client needs either to prompt for a trust
/// decision or to show a remediation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Reachable and trusted. Carries certificate metadata accepted during
    /// this call, which the caller should persist with the repository.
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accepted_certificate: Option<CertificateMetadata>,
    },
    NotFound {
        path: String,
    },
    HostKeyMismatch {
        hostname: String,
        key: HostKey,
        expected_key: HostKey,
    },
    UnknownHostKey {
        hostname: String,
        key: HostKey,
    },
    UnverifiedCertificate {
        certificate: Certificate,
    },
    MissingUserKey,
    AuthenticationError {
        reason: String,
    },
    TransportError {
        reason: String,
    },
    BackendError {
        reason: String,
    },
    /// Trust-store failure, or trust negotiation that did not settle.
    ConfigError {
        reason: String,
    },
}

impl VerificationOutcome {
    pub fn success() -> Self {
        Self::Success {
            accepted_certificate: None,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::NotFound { .. } => OutcomeKind::NotFound,
            Self::HostKeyMismatch { .. } => OutcomeKind::HostKeyMismatch,
            Self::UnknownHostKey { .. } => OutcomeKind::UnknownHostKey,
            Self::UnverifiedCertificate { .. } => OutcomeKind::UnverifiedCertificate,
            Self::MissingUserKey => OutcomeKind::MissingUserKey,
            Self::AuthenticationError { .. } => OutcomeKind::AuthenticationError,
            Self::TransportError { .. } => OutcomeKind::TransportError,
            Self::BackendError { .. } => OutcomeKind::BackendError,
            Self::ConfigError { .. } => OutcomeKind::ConfigError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Certificate metadata accepted on the way to success, if any.
    pub fn accepted_certificate(&self) -> Option<&CertificateMetadata> {
        match self {
            Self::Success {
                accepted_certificate,
            } => accepted_certificate.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "repository is reachable"),
            Self::NotFound { path } => write!(f, "no repository found at {}", path),
            Self::HostKeyMismatch {
                hostname,
                key,
                expected_key,
            } => write!(
                f,
                "host key for {} changed: server offered {} but {} is trusted",
                hostname,
                key.fingerprint(),
                expected_key.fingerprint()
            ),
            Self::UnknownHostKey { hostname, key } => write!(
                f,
                "host key for {} is not trusted yet ({} {})",
                hostname,
                key.algorithm,
                key.fingerprint()
            ),
            Self::UnverifiedCertificate { certificate } => write!(
                f,
                "certificate for {} (issuer {}, fingerprint {}) failed verification: {}",
                certificate.hostname,
                certificate.issuer,
                certificate.fingerprint,
                certificate.failures.join(", ")
            ),
            Self::MissingUserKey => write!(
                f,
                "server only accepts public-key authentication and no user key is configured"
            ),
            Self::AuthenticationError { reason } => write!(f, "authentication failed: {}", reason),
            Self::TransportError { reason } => write!(f, "could not talk to the server: {}", reason),
            Self::BackendError { reason } => write!(f, "repository backend error: {}", reason),
            Self::ConfigError { reason } => write!(f, "server configuration error: {}", reason),
        }
    }
}

/// Payload-free tag of a [`VerificationOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NotFound,
    HostKeyMismatch,
    UnknownHostKey,
    UnverifiedCertificate,
    MissingUserKey,
    AuthenticationError,
    TransportError,
    BackendError,
    ConfigError,
}

impl OutcomeKind {
    /// Resolvable by recording a trust decision and probing again.
    pub const fn is_trust_negotiable(&self) -> bool {
        matches!(
            self,
            Self::HostKeyMismatch | Self::UnknownHostKey | Self::UnverifiedCertificate
        )
    }

    /// Catalog entry for this outcome; `None` for success.
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success => None,
            Self::NotFound => Some(ErrorCode::RepositoryNotFound),
            Self::HostKeyMismatch => Some(ErrorCode::TrustHostKeyMismatch),
            Self::UnknownHostKey => Some(ErrorCode::TrustUnknownHostKey),
            Self::UnverifiedCertificate => Some(ErrorCode::TrustUnverifiedCertificate),
            Self::MissingUserKey => Some(ErrorCode::AuthMissingUserKey),
            Self::AuthenticationError => Some(ErrorCode::AuthRejected),
            Self::TransportError => Some(ErrorCode::NetworkTransportFailed),
            Self::BackendError => Some(ErrorCode::RepositoryBackendError),
            Self::ConfigError => Some(ErrorCode::ConfigTrustStoreFailed),
        }
    }
}
