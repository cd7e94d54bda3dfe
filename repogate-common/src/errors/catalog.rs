//! Error Catalog for repogate
//!
//! Every failure a client can see has a stable code, a message template,
//! remediation steps, an HTTP status for the registration API and, where
//! applicable, a documentation link.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                               |
//! |------------|-------------|-------------------------------------------|
//! | E001-E099  | Config      | Configuration and trust-store persistence |
//! | E100-E199  | Network     | Transport failures while probing          |
//! | E200-E299  | Trust       | Host keys and certificates                |
//! | E300-E399  | Auth        | Credentials                               |
//! | E400-E499  | Repository  | Repository location and records           |
//! | E500-E599  | Internal    | Internal/unexpected errors                |
//!
//! # Example
//!
//! ```rust
//! use repogate_common::errors::catalog::ErrorCode;
//!
//! let entry = ErrorCode::TrustUnknownHostKey.entry();
//! println!("Error {}: {}", entry.code, entry.message);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every repogate failure.
///
/// Each variant maps to a unique code in the RG-Exxx format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML syntax
    ConfigParseError,
    /// Configuration contains invalid values
    ConfigValidationError,
    /// Environment variable has invalid value
    ConfigEnvError,
    /// Trust store could not be updated, or trust negotiation did not settle
    ConfigTrustStoreFailed,

    // =========================================================================
    // Network Errors (E100-E199)
    // =========================================================================
    /// Transport failed while checking the repository
    NetworkTransportFailed,

    // =========================================================================
    // Trust Errors (E200-E299)
    // =========================================================================
    /// Server host key does not match the trusted key
    TrustHostKeyMismatch,
    /// Server host key is not trusted yet
    TrustUnknownHostKey,
    /// Server certificate could not be verified
    TrustUnverifiedCertificate,

    // =========================================================================
    // Auth Errors (E300-E399)
    // =========================================================================
    /// Public-key auth required but no user key configured
    AuthMissingUserKey,
    /// Credentials rejected
    AuthRejected,

    // =========================================================================
    // Repository Errors (E400-E499)
    // =========================================================================
    /// No repository at the given path
    RepositoryNotFound,
    /// Backend reported an error while checking the repository
    RepositoryBackendError,
    /// Request fields are invalid (e.g. unknown tool)
    RepositoryInvalidForm,
    /// Repository record does not exist
    RepositoryRecordNotFound,

    // =========================================================================
    // Internal Errors (E500-E599)
    // =========================================================================
    /// A probe failed in a way nobody has classified
    InternalUnclassified,
    /// Serialization/deserialization error
    InternalSerdeError,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            // Config (001-099)
            Self::ConfigReadError => 1,
            Self::ConfigParseError => 2,
            Self::ConfigValidationError => 3,
            Self::ConfigEnvError => 4,
            Self::ConfigTrustStoreFailed => 10,

            // Network (100-199)
            Self::NetworkTransportFailed => 100,

            // Trust (200-299)
            Self::TrustHostKeyMismatch => 200,
            Self::TrustUnknownHostKey => 201,
            Self::TrustUnverifiedCertificate => 202,

            // Auth (300-399)
            Self::AuthMissingUserKey => 300,
            Self::AuthRejected => 301,

            // Repository (400-499)
            Self::RepositoryNotFound => 400,
            Self::RepositoryBackendError => 401,
            Self::RepositoryInvalidForm => 402,
            Self::RepositoryRecordNotFound => 403,

            // Internal (500-599)
            Self::InternalUnclassified => 500,
            Self::InternalSerdeError => 501,
        }
    }

    /// Returns the formatted error code string (e.g., "RG-E201").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("RG-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Network,
            200..=299 => ErrorCategory::Trust,
            300..=399 => ErrorCategory::Auth,
            400..=499 => ErrorCategory::Repository,
            _ => ErrorCategory::Internal,
        }
    }

    /// HTTP status the registration API answers with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::TrustHostKeyMismatch
            | Self::TrustUnknownHostKey
            | Self::TrustUnverifiedCertificate
            | Self::AuthMissingUserKey
            | Self::AuthRejected => 403,
            Self::RepositoryRecordNotFound => 404,
            Self::RepositoryNotFound
            | Self::RepositoryBackendError
            | Self::RepositoryInvalidForm
            | Self::NetworkTransportFailed => 400,
            Self::ConfigReadError
            | Self::ConfigParseError
            | Self::ConfigValidationError
            | Self::ConfigEnvError
            | Self::ConfigTrustStoreFailed
            | Self::InternalUnclassified
            | Self::InternalSerdeError => 500,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            doc_url: self.doc_url().map(String::from),
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML syntax",
            Self::ConfigValidationError => "Configuration contains invalid values",
            Self::ConfigEnvError => "Environment variable has invalid value",
            Self::ConfigTrustStoreFailed => "Host trust could not be recorded",
            Self::NetworkTransportFailed => "Could not communicate with the repository server",
            Self::TrustHostKeyMismatch => "Server host key does not match the trusted key",
            Self::TrustUnknownHostKey => "Server host key is not trusted",
            Self::TrustUnverifiedCertificate => "Server certificate could not be verified",
            Self::AuthMissingUserKey => "Server requires a public key and none is configured",
            Self::AuthRejected => "Repository credentials were rejected",
            Self::RepositoryNotFound => "No repository exists at the given path",
            Self::RepositoryBackendError => "Repository backend reported an error",
            Self::RepositoryInvalidForm => "Request contains invalid fields",
            Self::RepositoryRecordNotFound => "Repository does not exist",
            Self::InternalUnclassified => "Unexpected error while checking the repository",
            Self::InternalSerdeError => "Failed to serialize or parse data",
        }
    }

    /// Returns remediation steps for the error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigReadError => &[
                "Check that the configuration file exists and is readable",
                "Pass --config to point at a different file",
            ],
            Self::ConfigParseError => &[
                "Fix the TOML syntax error reported above",
                "Run `repogate config show` to see the effective configuration",
            ],
            Self::ConfigValidationError => &[
                "Check the value ranges documented for each setting",
                "Remove the setting to fall back to its default",
            ],
            Self::ConfigEnvError => &[
                "Check REPOGATE_* environment variables for typos",
                "Unset the variable to fall back to the configured value",
            ],
            Self::ConfigTrustStoreFailed => &[
                "Check that the trust store directory exists and is writable",
                "Check free disk space on the trust store volume",
                "If the server keeps presenting a changing key, investigate before trusting it",
            ],
            Self::NetworkTransportFailed => &[
                "Check that the hostname resolves and the port is reachable",
                "Check firewalls and proxies between this host and the server",
                "Increase the probe timeout if the server is slow",
            ],
            Self::TrustHostKeyMismatch => &[
                "Confirm with the server administrator that the host key was rotated",
                "Retry with trust_host enabled to replace the stored key",
                "If the change is unexpected, treat it as a possible interception",
            ],
            Self::TrustUnknownHostKey => &[
                "Compare the fingerprint with the one published by the server administrator",
                "Retry with trust_host enabled to record the key",
            ],
            Self::TrustUnverifiedCertificate => &[
                "Check the certificate's issuer and validity window",
                "Retry with trust_host enabled to accept the certificate",
            ],
            Self::AuthMissingUserKey => &[
                "Configure an SSH identity file ([ssh] identity_file)",
                "Add the matching public key to the account on the server",
            ],
            Self::AuthRejected => &[
                "Check the username and password",
                "Check that the account has read access to the repository",
            ],
            Self::RepositoryNotFound => &[
                "Check the repository path for typos",
                "Check that the account can see the repository",
            ],
            Self::RepositoryBackendError => &[
                "Read the backend's error message above",
                "Check that the repository type matches the selected tool",
            ],
            Self::RepositoryInvalidForm => &["Correct the fields listed in the response"],
            Self::RepositoryRecordNotFound => &[
                "Check the repository ID",
                "List repositories with show_invisible to include hidden ones",
            ],
            Self::InternalUnclassified => &[
                "Re-run with --verbose and report the log output",
                "This indicates a failure mode that needs a classifier update",
            ],
            Self::InternalSerdeError => &["Report this issue with the data that failed to parse"],
        }
    }

    /// Returns the documentation URL for the error, if available.
    #[must_use]
    pub const fn doc_url(&self) -> Option<&'static str> {
        match self.category() {
            ErrorCategory::Config => Some("https://repogate.dev/docs/config"),
            ErrorCategory::Network => Some("https://repogate.dev/docs/network"),
            ErrorCategory::Trust => Some("https://repogate.dev/docs/trust"),
            ErrorCategory::Auth => Some("https://repogate.dev/docs/credentials"),
            ErrorCategory::Repository => Some("https://repogate.dev/docs/repositories"),
            ErrorCategory::Internal => None,
        }
    }

    /// Returns all error codes.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::ConfigTrustStoreFailed,
            Self::NetworkTransportFailed,
            Self::TrustHostKeyMismatch,
            Self::TrustUnknownHostKey,
            Self::TrustUnverifiedCertificate,
            Self::AuthMissingUserKey,
            Self::AuthRejected,
            Self::RepositoryNotFound,
            Self::RepositoryBackendError,
            Self::RepositoryInvalidForm,
            Self::RepositoryRecordNotFound,
            Self::InternalUnclassified,
            Self::InternalSerdeError,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and trust-store persistence (E001-E099)
    Config,
    /// Transport failures (E100-E199)
    Network,
    /// Host keys and certificates (E200-E299)
    Trust,
    /// Credentials (E300-E399)
    Auth,
    /// Repository location and records (E400-E499)
    Repository,
    /// Internal/unexpected errors (E500-E599)
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Network => "Network",
            Self::Trust => "Trust",
            Self::Auth => "Authentication",
            Self::Repository => "Repository",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "RG-E201")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
    /// Documentation URL, if available
    pub doc_url: Option<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("Remediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        if let Some(url) = &self.doc_url {
            output.push_str(&format!("\nFor more information: {}\n", url));
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
