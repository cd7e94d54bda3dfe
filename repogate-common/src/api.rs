//! API-facing error payloads.
//!
//! Maps verification outcomes and workflow failures to an HTTP status, a
//! stable wire code and a JSON payload a client can act on (for example by
//! showing a host key fingerprint and asking whether to trust it).

use crate::errors::ErrorCode;
use crate::outcome::VerificationOutcome;
use crate::verify::VerifyError;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Error response for the repository API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Wire code, e.g. `unverified_host_key`.
    pub code: &'static str,
    /// Catalog entry for operators.
    pub error_code: ErrorCode,
    pub message: String,
    /// Extra fields merged into the response body.
    pub payload: Map<String, Value>,
}

impl ApiError {
    fn new(code: &'static str, error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: error_code.http_status(),
            code,
            error_code,
            message: message.into(),
            payload: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Error for a non-success outcome; `None` for success.
    pub fn from_outcome(outcome: &VerificationOutcome) -> Option<Self> {
        let kind = outcome.kind();
        let error_code = kind.error_code()?;
        let message = outcome.to_string();
        let error = match outcome {
            VerificationOutcome::Success { .. } => return None,
            VerificationOutcome::NotFound { path } => {
                Self::new("missing_repository", error_code, message).with("path", json!(path))
            }
            VerificationOutcome::HostKeyMismatch {
                hostname,
                key,
                expected_key,
            } => Self::new("bad_host_key", error_code, message)
                .with("hostname", json!(hostname))
                .with("key", json!(key.to_base64()))
                .with("expected_key", json!(expected_key.to_base64())),
            VerificationOutcome::UnknownHostKey { hostname, key } => {
                Self::new("unverified_host_key", error_code, message)
                    .with("hostname", json!(hostname))
                    .with("key", json!(key.to_base64()))
            }
            VerificationOutcome::UnverifiedCertificate { certificate } => {
                Self::new("unverified_host_cert", error_code, message).with(
                    "certificate",
                    json!({
                        "failures": certificate.failures,
                        "fingerprint": certificate.fingerprint,
                        "hostname": certificate.hostname,
                        "issuer": certificate.issuer,
                        "valid": {
                            "from": certificate.valid.from,
                            "until": certificate.valid.until,
                        },
                    }),
                )
            }
            VerificationOutcome::MissingUserKey => {
                Self::new("missing_user_key", error_code, message)
            }
            VerificationOutcome::AuthenticationError { reason } => {
                Self::new("repo_authentication_error", error_code, message)
                    .with("reason", json!(reason))
            }
            VerificationOutcome::TransportError { reason }
            | VerificationOutcome::BackendError { reason } => {
                Self::new("repo_info_error", error_code, message).with("error", json!(reason))
            }
            VerificationOutcome::ConfigError { reason } => {
                Self::new("server_config_error", error_code, message).with("reason", json!(reason))
            }
        };
        Some(error)
    }

    /// Generic 500 for an unclassified failure. Details stay in the logs.
    pub fn internal(error: &VerifyError) -> Self {
        Self::new(
            "internal_error",
            error.error_code(),
            ErrorCode::InternalUnclassified.message(),
        )
    }

    pub fn invalid_form(fields: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(
            "invalid_form_data",
            ErrorCode::RepositoryInvalidForm,
            ErrorCode::RepositoryInvalidForm.message(),
        )
        .with("fields", json!(fields))
    }

    pub fn does_not_exist() -> Self {
        Self::new(
            "does_not_exist",
            ErrorCode::RepositoryRecordNotFound,
            ErrorCode::RepositoryRecordNotFound.message(),
        )
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new("internal_error", ErrorCode::InternalSerdeError, message)
    }

    /// Response body: `{"stat": "fail", "err": {...}, <payload>}`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("stat".to_string(), json!("fail"));
        body.insert(
            "err".to_string(),
            json!({
                "code": self.code,
                "catalog": self.error_code.code_string(),
                "msg": self.message,
            }),
        );
        for (key, value) in &self.payload {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl std::error::Error for ApiError {}
