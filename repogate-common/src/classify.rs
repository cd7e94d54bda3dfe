//! Probe failure classification.
//!
//! Every [`ProbeError`] maps to exactly one [`Classification`]:
//!
//! | Probe failure            | Outcome                 | Store action on auto-trust |
//! |--------------------------|-------------------------|----------------------------|
//! | `RepositoryNotFound`     | `NotFound`              | -                          |
//! | `BadHostKey`             | `HostKeyMismatch`       | replace host key           |
//! | `UnknownHostKey`         | `UnknownHostKey`        | add host key               |
//! | `UnverifiedCertificate`  | `UnverifiedCertificate` | accept certificate         |
//! | `Authentication` (1)     | `MissingUserKey`        | -                          |
//! | `Authentication`         | `AuthenticationError`   | -                          |
//! | `Ssh`, `Timeout`         | `TransportError`        | -                          |
//! | `Scm`                    | `BackendError`          | -                          |
//! | `Other`                  | fatal                   | -                          |
//!
//! (1) only when `publickey` is the sole allowed method and no local key
//! was available.

use crate::outcome::{OutcomeKind, VerificationOutcome};
use crate::probe::ProbeError;
use crate::types::{Certificate, HostKey};

/// Trust-store mutation that resolves a trust-negotiable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAction {
    AddHostKey {
        hostname: String,
        key: HostKey,
    },
    ReplaceHostKey {
        hostname: String,
        old_key: HostKey,
        new_key: HostKey,
    },
    AcceptCertificate {
        certificate: Certificate,
    },
}

/// Result of classifying one probe failure.
#[derive(Debug)]
pub enum Classification {
    /// Needs different credentials or configuration.
    Terminal(VerificationOutcome),
    /// Resolvable by recording a trust decision. The outcome is what the
    /// caller sees when auto-trust is off.
    Negotiable {
        outcome: VerificationOutcome,
        action: TrustAction,
    },
    /// Not recognised; must propagate unmodified.
    Fatal(Box<dyn std::error::Error + Send + Sync>),
}

impl Classification {
    /// Outcome kind, or `None` for a fatal failure.
    pub fn kind(&self) -> Option<OutcomeKind> {
        match self {
            Self::Terminal(outcome) | Self::Negotiable { outcome, .. } => Some(outcome.kind()),
            Self::Fatal(_) => None,
        }
    }
}

/// Map a probe failure to its outcome and, when negotiable, its store action.
pub fn classify(error: ProbeError) -> Classification {
    match error {
        ProbeError::RepositoryNotFound { path } => {
            Classification::Terminal(VerificationOutcome::NotFound { path })
        }
        ProbeError::BadHostKey {
            hostname,
            key,
            expected_key,
        } => Classification::Negotiable {
            action: TrustAction::ReplaceHostKey {
                hostname: hostname.clone(),
                old_key: expected_key.clone(),
                new_key: key.clone(),
            },
            outcome: VerificationOutcome::HostKeyMismatch {
                hostname,
                key,
                expected_key,
            },
        },
        ProbeError::UnknownHostKey { hostname, key } => Classification::Negotiable {
            action: TrustAction::AddHostKey {
                hostname: hostname.clone(),
                key: key.clone(),
            },
            outcome: VerificationOutcome::UnknownHostKey { hostname, key },
        },
        ProbeError::UnverifiedCertificate { certificate } => Classification::Negotiable {
            action: TrustAction::AcceptCertificate {
                certificate: certificate.clone(),
            },
            outcome: VerificationOutcome::UnverifiedCertificate { certificate },
        },
        ProbeError::Authentication {
            reason,
            allowed_types,
            has_user_key,
        } => {
            if is_missing_user_key(&allowed_types, has_user_key) {
                Classification::Terminal(VerificationOutcome::MissingUserKey)
            } else {
                Classification::Terminal(VerificationOutcome::AuthenticationError { reason })
            }
        }
        err @ (ProbeError::Ssh { .. } | ProbeError::Timeout { .. }) => {
            Classification::Terminal(VerificationOutcome::TransportError {
                reason: err.to_string(),
            })
        }
        ProbeError::Scm { message } => {
            Classification::Terminal(VerificationOutcome::BackendError { reason: message })
        }
        ProbeError::Other(source) => Classification::Fatal(source),
    }
}

/// Public-key auth is the only way in and we had no key to offer.
fn is_missing_user_key(allowed_types: &[String], has_user_key: bool) -> bool {
    !has_user_key
        && !allowed_types.is_empty()
        && allowed_types.iter().all(|method| method == "publickey")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Validity;
    use std::time::Duration;

    fn key(byte: u8) -> HostKey {
        HostKey::new("ssh-rsa", vec![byte; 16])
    }

    fn auth(allowed: &[&str], has_user_key: bool) -> ProbeError {
        ProbeError::Authentication {
            reason: "Permission denied".to_string(),
            allowed_types: allowed.iter().map(|s| s.to_string()).collect(),
            has_user_key,
        }
    }

    #[test]
    fn test_not_found_is_terminal() {
        let c = classify(ProbeError::not_found("/srv/missing.git"));
        assert_eq!(c.kind(), Some(OutcomeKind::NotFound));
        assert!(matches!(
            c,
            Classification::Terminal(VerificationOutcome::NotFound { ref path }) if path == "/srv/missing.git"
        ));
    }

    #[test]
    fn test_bad_host_key_replaces_expected_with_observed() {
        let c = classify(ProbeError::BadHostKey {
            hostname: "h".to_string(),
            key: key(2),
            expected_key: key(1),
        });
        match c {
            Classification::Negotiable { outcome, action } => {
                assert_eq!(outcome.kind(), OutcomeKind::HostKeyMismatch);
                assert_eq!(
                    action,
                    TrustAction::ReplaceHostKey {
                        hostname: "h".to_string(),
                        old_key: key(1),
                        new_key: key(2),
                    }
                );
            }
            other => panic!("expected negotiable, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_host_key_adds_observed() {
        let observed = key(9);
        let c = classify(ProbeError::UnknownHostKey {
            hostname: "h".to_string(),
            key: observed.clone(),
        });
        assert!(matches!(
            c,
            Classification::Negotiable {
                action: TrustAction::AddHostKey { key: ref added, .. },
                ..
            } if *added == observed
        ));
    }

    #[test]
    fn test_unverified_certificate_is_negotiable() {
        let certificate = Certificate {
            fingerprint: "ff".to_string(),
            hostname: "h".to_string(),
            issuer: "i".to_string(),
            valid: Validity::default(),
            failures: vec!["expired".to_string()],
        };
        let c = classify(ProbeError::UnverifiedCertificate {
            certificate: certificate.clone(),
        });
        assert_eq!(c.kind(), Some(OutcomeKind::UnverifiedCertificate));
        assert!(matches!(
            c,
            Classification::Negotiable {
                action: TrustAction::AcceptCertificate { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_missing_user_key_only_when_publickey_is_sole_method() {
        assert_eq!(
            classify(auth(&["publickey"], false)).kind(),
            Some(OutcomeKind::MissingUserKey)
        );
        assert_eq!(
            classify(auth(&["publickey"], true)).kind(),
            Some(OutcomeKind::AuthenticationError)
        );
        assert_eq!(
            classify(auth(&["publickey", "password"], false)).kind(),
            Some(OutcomeKind::AuthenticationError)
        );
        assert_eq!(
            classify(auth(&[], false)).kind(),
            Some(OutcomeKind::AuthenticationError)
        );
    }

    #[test]
    fn test_authentication_reason_is_preserved() {
        let c = classify(ProbeError::Authentication {
            reason: "Bad password for user alice".to_string(),
            allowed_types: vec!["password".to_string()],
            has_user_key: false,
        });
        match c {
            Classification::Terminal(VerificationOutcome::AuthenticationError { reason }) => {
                assert_eq!(reason, "Bad password for user alice");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timeout_and_ssh_are_transport_errors() {
        assert_eq!(
            classify(ProbeError::ssh("Connection refused")).kind(),
            Some(OutcomeKind::TransportError)
        );
        let c = classify(ProbeError::Timeout {
            after: Duration::from_secs(3),
        });
        match c {
            Classification::Terminal(VerificationOutcome::TransportError { reason }) => {
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scm_is_backend_error_and_other_is_fatal() {
        assert_eq!(
            classify(ProbeError::scm("svn: E170013")).kind(),
            Some(OutcomeKind::BackendError)
        );
        let c = classify(ProbeError::other("boom"));
        assert!(c.kind().is_none());
        assert!(matches!(c, Classification::Fatal(ref e) if e.to_string() == "boom"));
    }
}
