//! `repogate verify`

use super::VerifyArgs;
use anyhow::{Context, Result, bail};
use repogate_common::probe::ssh::SshGitProbe;
use repogate_common::util::mask_credentials;
use repogate_common::{
    ApiError, FileTrustStore, Namespace, RepogateConfig, RepositoryLocation, RepositoryVerifier,
    ToolRegistry, TrustDecision, TrustStore, VerificationOutcome, VerifyOptions,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Exit status for a structured (non-fatal) verification failure.
const EXIT_VERIFICATION_FAILED: u8 = 2;

pub async fn run(args: &VerifyArgs, config: &RepogateConfig) -> Result<ExitCode> {
    let store: Arc<dyn TrustStore> =
        Arc::new(FileTrustStore::new(config.trust_store.resolved_root()));
    let tools = ToolRegistry::new().with(Arc::new(SshGitProbe::new(
        store.clone(),
        config.ssh.clone(),
    )));

    let Some(probe) = tools.get(&args.tool) else {
        bail!(
            "Unknown tool '{}' (available: {})",
            args.tool,
            tools.names().collect::<Vec<_>>().join(", ")
        );
    };

    let mut location = RepositoryLocation::new(args.path.clone());
    if let Some(username) = &args.username {
        location = location.with_username(username.clone());
    }
    if let Some(var) = &args.password_env {
        let password = std::env::var(var)
            .with_context(|| format!("Password variable {} is not set", var))?;
        location = location.with_password(password);
    }

    let mut options = VerifyOptions::from(&config.verification);
    if let Some(secs) = args.timeout {
        options.probe_timeout = Duration::from_secs(secs.max(1));
    }
    let decision = TrustDecision::from(args.trust_host || config.verification.auto_trust);
    let namespace = Namespace::from_option(args.namespace.as_deref());

    info!(
        "Verifying {} with {} in {}",
        mask_credentials(&location.path),
        probe.name(),
        namespace
    );
    let verifier = RepositoryVerifier::new(store).with_options(options);

    match verifier
        .verify(probe.as_ref(), &location, decision, &namespace)
        .await
    {
        Ok(outcome) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
            } else {
                print!("{}", render_outcome(&outcome, decision));
            }
            Ok(ExitCode::from(exit_status(&outcome)))
        }
        Err(err) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ApiError::internal(&err).to_json())?
                );
            }
            Err(err).context("Repository check failed unexpectedly")
        }
    }
}

fn exit_status(outcome: &VerificationOutcome) -> u8 {
    if outcome.is_success() {
        0
    } else {
        EXIT_VERIFICATION_FAILED
    }
}

/// `{"stat": "ok", ...}` on success, the API error body otherwise.
fn outcome_json(outcome: &VerificationOutcome) -> serde_json::Value {
    match ApiError::from_outcome(outcome) {
        Some(error) => error.to_json(),
        None => {
            let mut body = serde_json::json!({ "stat": "ok" });
            if let Some(metadata) = outcome.accepted_certificate() {
                body["cert"] = serde_json::json!(metadata);
            }
            body
        }
    }
}

fn render_outcome(outcome: &VerificationOutcome, decision: TrustDecision) -> String {
    let mut out = String::new();
    match outcome {
        VerificationOutcome::Success {
            accepted_certificate,
        } => {
            out.push_str("OK: repository is reachable\n");
            if let Some(metadata) = accepted_certificate {
                out.push_str(&format!(
                    "Accepted certificate {} issued by {} for {}\n",
                    metadata.fingerprint, metadata.issuer, metadata.hostname
                ));
            }
        }
        failure => {
            if let Some(code) = failure.kind().error_code() {
                out.push_str(&code.entry().format_full());
            }
            out.push_str(&format!("\nDetails: {}\n", failure));
            if failure.kind().is_trust_negotiable() && !decision.auto_trust {
                out.push_str("Re-run with --trust-host to accept it.\n");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use repogate_common::HostKey;

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&VerificationOutcome::success()), 0);
        assert_eq!(
            exit_status(&VerificationOutcome::MissingUserKey),
            EXIT_VERIFICATION_FAILED
        );
    }

    #[test]
    fn test_render_unknown_key_suggests_trust_host() {
        let outcome = VerificationOutcome::UnknownHostKey {
            hostname: "git.example.com".to_string(),
            key: HostKey::new("ssh-ed25519", vec![1; 32]),
        };
        let text = render_outcome(&outcome, TrustDecision::prompt());
        assert!(text.contains("[RG-E201]"));
        assert!(text.contains("git.example.com"));
        assert!(text.contains("--trust-host"));

        let text = render_outcome(&outcome, TrustDecision::auto());
        assert!(!text.contains("--trust-host"));
    }

    #[test]
    fn test_outcome_json_success_and_failure() {
        assert_eq!(
            outcome_json(&VerificationOutcome::success()),
            serde_json::json!({"stat": "ok"})
        );
        let body = outcome_json(&VerificationOutcome::NotFound {
            path: "/srv/none.git".to_string(),
        });
        assert_eq!(body["stat"], "fail");
        assert_eq!(body["err"]["code"], "missing_repository");
    }
}
