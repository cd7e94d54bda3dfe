//! Shared library for repogate.
//!
//! Verifies that a source-code repository is reachable with the supplied
//! credentials, negotiating trust (host keys, certificates) on the way and
//! recording accepted trust decisions per namespace.

pub mod api;
pub mod classify;
pub mod config;
pub mod errors;
pub mod mock;
pub mod outcome;
pub mod probe;
pub mod registry;
pub mod trust;
pub mod types;
pub mod util;
pub mod verify;

pub use api::ApiError;
pub use classify::{Classification, TrustAction, classify};
pub use config::{ConfigError, RepogateConfig};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use outcome::{OutcomeKind, VerificationOutcome};
pub use probe::ssh::SshGitProbe;
pub use probe::{Probe, ProbeError, ToolRegistry};
pub use registry::{RegistryError, RepositoryRegistry};
pub use trust::{FileTrustStore, MemoryTrustStore, TrustEntry, TrustStore, TrustStoreError};
pub use types::{
    Certificate, CertificateMetadata, HostKey, Namespace, RepositoryLocation, Secret,
    TrustDecision, Validity,
};
pub use verify::{RepositoryVerifier, VerifyError, VerifyOptions};
