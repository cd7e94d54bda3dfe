//! `repogate trust`

use super::TrustCommand;
use anyhow::{Context, Result};
use repogate_common::{FileTrustStore, Namespace, RepogateConfig, TrustEntry, TrustStore};
use std::process::ExitCode;

pub fn run(command: &TrustCommand, config: &RepogateConfig) -> Result<ExitCode> {
    match command {
        TrustCommand::List { namespace, json } => {
            let root = config.trust_store.resolved_root();
            let store = FileTrustStore::new(&root);
            let namespace = namespace.as_deref().map(Namespace::named);
            let entries = store
                .entries(namespace.as_ref())
                .with_context(|| format!("Failed to read trust store at {}", root.display()))?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No trusted host keys or certificates in {}", root.display());
            } else {
                print!("{}", render_entries(&entries));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn render_entries(entries: &[TrustEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let line = match entry {
            TrustEntry::HostKey {
                namespace,
                hostname,
                key,
            } => format!(
                "{:<16} host  {:<32} {} {}",
                namespace.to_string(),
                hostname,
                key.algorithm,
                key.fingerprint()
            ),
            TrustEntry::Certificate {
                namespace,
                path,
                certificate,
            } => format!(
                "{:<16} cert  {:<32} {} (issuer {}, accepted {})",
                namespace.to_string(),
                path,
                certificate.fingerprint,
                certificate.issuer,
                certificate.accepted_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
