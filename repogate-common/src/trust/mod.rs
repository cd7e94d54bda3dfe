//! Namespace-scoped record of accepted host keys and certificates.
//!
//! The store is the only thing the verifier mutates. Every operation takes
//! the namespace explicitly; there is no implicit default scope.
//!
//! Implementations must make mutations of the same (namespace, hostname) or
//! (namespace, path) key mutually exclusive and atomic. Last writer wins.

pub mod file;
pub mod memory;

pub use file::FileTrustStore;
pub use memory::MemoryTrustStore;

use crate::types::{Certificate, CertificateMetadata, HostKey, Namespace};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Persistence failure inside a trust store.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trust data at {} is unreadable: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("trust store is read-only")]
    ReadOnly,
}

impl TrustStoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// One stored trust decision, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrustEntry {
    HostKey {
        namespace: Namespace,
        hostname: String,
        key: HostKey,
    },
    Certificate {
        namespace: Namespace,
        path: String,
        certificate: CertificateMetadata,
    },
}

impl TrustEntry {
    pub fn namespace(&self) -> &Namespace {
        match self {
            Self::HostKey { namespace, .. } | Self::Certificate { namespace, .. } => namespace,
        }
    }
}

/// Durable trust decisions used to validate probes without re-negotiation.
pub trait TrustStore: Send + Sync {
    /// The key currently trusted for `hostname`, if any.
    fn host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
    ) -> Result<Option<HostKey>, TrustStoreError>;

    /// Record `key` as the trusted key for `hostname`.
    fn add_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        key: &HostKey,
    ) -> Result<(), TrustStoreError>;

    /// Supersede the trusted key for `hostname` with `new_key`.
    fn replace_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        old_key: &HostKey,
        new_key: &HostKey,
    ) -> Result<(), TrustStoreError>;

    /// The accepted certificate for the repository at `path`, if any.
    fn certificate(
        &self,
        namespace: &Namespace,
        path: &str,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError>;

    /// Accept `certificate` for the repository at `path`.
    ///
    /// Returns metadata the caller should persist with the repository.
    fn accept_certificate(
        &self,
        namespace: &Namespace,
        path: &str,
        certificate: &Certificate,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError>;

    /// All stored decisions, optionally restricted to one namespace.
    fn entries(&self, namespace: Option<&Namespace>) -> Result<Vec<TrustEntry>, TrustStoreError>;
}

impl<T: TrustStore + ?Sized> TrustStore for std::sync::Arc<T> {
    fn host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
    ) -> Result<Option<HostKey>, TrustStoreError> {
        (**self).host_key(namespace, hostname)
    }

    fn add_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        key: &HostKey,
    ) -> Result<(), TrustStoreError> {
        (**self).add_host_key(namespace, hostname, key)
    }

    fn replace_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        old_key: &HostKey,
        new_key: &HostKey,
    ) -> Result<(), TrustStoreError> {
        (**self).replace_host_key(namespace, hostname, old_key, new_key)
    }

    fn certificate(
        &self,
        namespace: &Namespace,
        path: &str,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError> {
        (**self).certificate(namespace, path)
    }

    fn accept_certificate(
        &self,
        namespace: &Namespace,
        path: &str,
        certificate: &Certificate,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError> {
        (**self).accept_certificate(namespace, path, certificate)
    }

    fn entries(&self, namespace: Option<&Namespace>) -> Result<Vec<TrustEntry>, TrustStoreError> {
        (**self).entries(namespace)
    }
}
