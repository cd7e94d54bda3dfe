//! Backend probes ("tools").
//!
//! A probe performs one lightweight connectivity check against a repository
//! and either succeeds or reports exactly one [`ProbeError`]. Probes are
//! stateless per call; any connection they open is released before the
//! returned future completes or is dropped.

pub mod ssh;

use crate::types::{Certificate, HostKey, Namespace, RepositoryLocation};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Typed failure reported by a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Nothing that looks like a repository exists at the path.
    #[error("repository not found at {path}")]
    RepositoryNotFound { path: String },

    /// The server offered a key that differs from the trusted one on file.
    #[error("host key for {hostname} does not match the trusted key ({} offered, {} expected)", key.fingerprint(), expected_key.fingerprint())]
    BadHostKey {
        hostname: String,
        key: HostKey,
        expected_key: HostKey,
    },

    /// No key is on file for this host.
    #[error("host key for {hostname} is not trusted ({})", key.fingerprint())]
    UnknownHostKey { hostname: String, key: HostKey },

    /// The server certificate for this repository could not be verified.
    #[error("certificate for {} could not be verified: {}", certificate.hostname, certificate.failures.join(", "))]
    UnverifiedCertificate { certificate: Certificate },

    /// Credentials were rejected.
    #[error("{reason}")]
    Authentication {
        reason: String,
        /// Methods the server said it would accept (e.g. `publickey`).
        allowed_types: Vec<String>,
        /// Whether a local private key was available to offer.
        has_user_key: bool,
    },

    /// Transport failure while talking to the server.
    #[error("{message}")]
    Ssh { message: String },

    /// The attempt did not finish within the caller's timeout.
    #[error("repository check timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    /// Backend-specific failure not covered by the variants above.
    #[error("{message}")]
    Scm { message: String },

    /// Anything the probe could not put in a category.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProbeError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::RepositoryNotFound { path: path.into() }
    }

    pub fn ssh(message: impl Into<String>) -> Self {
        Self::Ssh {
            message: message.into(),
        }
    }

    pub fn scm(message: impl Into<String>) -> Self {
        Self::Scm {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Other(message.into())
    }
}

/// Connectivity check for one kind of repository.
pub trait Probe: Send + Sync {
    /// Tool name used to look the probe up (e.g. `git-ssh`).
    fn name(&self) -> &str;

    /// Try to reach the repository with the supplied credentials.
    fn check_reachable<'a>(
        &'a self,
        location: &'a RepositoryLocation,
        namespace: &'a Namespace,
    ) -> BoxFuture<'a, Result<(), ProbeError>>;
}

/// Registered tools, looked up by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Probe>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe under its own name, replacing any previous one.
    pub fn register(&mut self, probe: Arc<dyn Probe>) {
        self.tools.insert(probe.name().to_string(), probe);
    }

    pub fn with(mut self, probe: Arc<dyn Probe>) -> Self {
        self.register(probe);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Probe>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
