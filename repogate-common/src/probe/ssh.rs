//! Git over SSH probe.
//!
//! The server's host keys are fetched with `ssh-keyscan` and checked against
//! the trust store before any authentication is attempted. Only then is
//! `git ls-remote` run, pinned to the trusted key through a temporary
//! known_hosts file, with `BatchMode` so nothing ever prompts.

use super::{Probe, ProbeError};
use crate::config::SshConfig;
use crate::trust::TrustStore;
use crate::trust::file::{format_known_hosts, parse_known_hosts};
use crate::types::{HostKey, Namespace, RepositoryLocation};
use crate::util::mask_credentials;
use futures::future::BoxFuture;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Tool name for [`SshGitProbe`].
pub const TOOL_NAME: &str = "git-ssh";

/// Seconds ssh-keyscan waits for each host.
const KEYSCAN_TIMEOUT_SECS: u32 = 10;

/// Host key algorithms in order of preference when reporting a key.
const KEY_PREFERENCE: [&str; 4] = [
    "ssh-ed25519",
    "ecdsa-sha2-nistp256",
    "rsa-sha2-512",
    "ssh-rsa",
];

/// Parsed SSH repository location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    /// Written as `[user@]host:path` rather than an `ssh://` URL.
    pub scp_style: bool,
}

impl SshTarget {
    /// Parse `ssh://[user@]host[:port]/path` or scp-style `[user@]host:path`.
    pub fn parse(location: &str) -> Option<Self> {
        let location = location.trim();
        for scheme in ["ssh://", "git+ssh://", "ssh+git://"] {
            if let Some(rest) = location.strip_prefix(scheme) {
                return Self::parse_url(rest);
            }
        }
        if location.contains("://") {
            return None;
        }
        Self::parse_scp(location)
    }

    fn parse_url(rest: &str) -> Option<Self> {
        let slash = rest.find('/')?;
        let (authority, path) = rest.split_at(slash);
        let (user, host_port) = split_user(authority);
        let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']')?;
            match after.strip_prefix(':') {
                Some(port) => (host, Some(port.parse::<u16>().ok()?)),
                None if after.is_empty() => (host, None),
                None => return None,
            }
        } else {
            match host_port.split_once(':') {
                Some((host, port)) => (host, Some(port.parse::<u16>().ok()?)),
                None => (host_port, None),
            }
        };
        if host.is_empty() || path.len() <= 1 {
            return None;
        }
        Some(Self {
            user,
            host: host.to_string(),
            port,
            path: path.to_string(),
            scp_style: false,
        })
    }

    fn parse_scp(location: &str) -> Option<Self> {
        let colon = location.find(':')?;
        if location[..colon].contains('/') {
            return None;
        }
        let (authority, path) = (&location[..colon], &location[colon + 1..]);
        let (user, host) = split_user(authority);
        if host.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self {
            user,
            host: host.to_string(),
            port: None,
            path: path.to_string(),
            scp_style: true,
        })
    }

    /// Name under which the host key is recorded (`[host]:port` for
    /// non-default ports, as OpenSSH does).
    pub fn known_hosts_name(&self) -> String {
        match self.port {
            Some(port) if port != 22 => format!("[{}]:{}", self.host, port),
            _ => self.host.clone(),
        }
    }

    /// URL handed to git. A non-empty `username` replaces the one in the
    /// location.
    pub fn git_url(&self, username: &str) -> String {
        let user = if username.is_empty() {
            self.user.clone()
        } else {
            Some(username.to_string())
        };
        let user_prefix = user.map(|u| format!("{}@", u)).unwrap_or_default();
        if self.scp_style {
            format!("{}{}:{}", user_prefix, self.host, self.path)
        } else {
            let port = self.port.map(|p| format!(":{}", p)).unwrap_or_default();
            format!("ssh://{}{}{}{}", user_prefix, self.host, port, self.path)
        }
    }
}

fn split_user(authority: &str) -> (Option<String>, &str) {
    match authority.rsplit_once('@') {
        Some((user, host)) if !user.is_empty() => (Some(user.to_string()), host),
        Some((_, host)) => (None, host),
        None => (None, authority),
    }
}

/// Checks git repositories reachable over SSH.
pub struct SshGitProbe {
    store: Arc<dyn TrustStore>,
    config: SshConfig,
}

impl SshGitProbe {
    pub fn new(store: Arc<dyn TrustStore>, config: SshConfig) -> Self {
        Self { store, config }
    }

    async fn scan_host_keys(&self, target: &SshTarget) -> Result<Vec<HostKey>, ProbeError> {
        let mut cmd = Command::new(&self.config.keyscan_binary);
        cmd.arg("-T").arg(KEYSCAN_TIMEOUT_SECS.to_string());
        if let Some(port) = target.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.arg(&target.host);
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        debug!("Running {} for {}", self.config.keyscan_binary, target.host);
        let output = cmd.output().await.map_err(|e| {
            ProbeError::other(format!(
                "failed to run {}: {}",
                self.config.keyscan_binary, e
            ))
        })?;

        let keys: Vec<HostKey> = parse_known_hosts(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .map(|(_, key)| key)
            .collect();
        if keys.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = first_meaningful_line(&stderr)
                .unwrap_or("no host keys received")
                .to_string();
            return Err(ProbeError::ssh(format!(
                "could not fetch host keys from {}: {}",
                target.host, detail
            )));
        }
        Ok(keys)
    }

    fn has_user_key(&self) -> bool {
        match &self.config.identity_file {
            Some(path) => path.exists(),
            None => default_identities().iter().any(|p| p.exists()),
        }
    }

    fn ssh_command(&self, known_hosts: &Path) -> String {
        let mut parts = vec![
            shell_escape::escape(self.config.ssh_binary.as_str().into()).to_string(),
            "-o BatchMode=yes".to_string(),
            "-o StrictHostKeyChecking=yes".to_string(),
            format!(
                "-o UserKnownHostsFile={}",
                shell_escape::escape(known_hosts.to_string_lossy())
            ),
            "-o GlobalKnownHostsFile=/dev/null".to_string(),
            format!("-o ConnectTimeout={}", KEYSCAN_TIMEOUT_SECS),
        ];
        if let Some(identity) = &self.config.identity_file {
            parts.push(format!("-i {}", shell_escape::escape(identity.to_string_lossy())));
            parts.push("-o IdentitiesOnly=yes".to_string());
        }
        parts.join(" ")
    }

    async fn ls_remote(
        &self,
        target: &SshTarget,
        location: &RepositoryLocation,
        trusted: &HostKey,
    ) -> Result<(), ProbeError> {
        let mut known_hosts = tempfile::NamedTempFile::new()
            .map_err(|e| ProbeError::other(format!("failed to create known_hosts file: {}", e)))?;
        let contents = format_known_hosts(&[(target.known_hosts_name(), trusted.clone())]);
        known_hosts
            .write_all(contents.as_bytes())
            .and_then(|_| known_hosts.flush())
            .map_err(|e| ProbeError::other(format!("failed to write known_hosts file: {}", e)))?;

        let url = target.git_url(&location.username);
        let mut cmd = Command::new(&self.config.git_binary);
        cmd.args(["ls-remote", "--exit-code", url.as_str(), "HEAD"])
            .env("GIT_SSH_COMMAND", self.ssh_command(known_hosts.path()))
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Running git ls-remote {}", mask_credentials(&url));
        let output = cmd.output().await.map_err(|e| {
            ProbeError::other(format!("failed to run {}: {}", self.config.git_binary, e))
        })?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // --exit-code: 2 means the repository exists but has no HEAD
        if output.status.code() == Some(2) && stderr.trim().is_empty() {
            return Ok(());
        }
        Err(classify_git_stderr(
            &stderr,
            &location.path,
            self.has_user_key(),
            output.status.code(),
        ))
    }
}

impl Probe for SshGitProbe {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn check_reachable<'a>(
        &'a self,
        location: &'a RepositoryLocation,
        namespace: &'a Namespace,
    ) -> BoxFuture<'a, Result<(), ProbeError>> {
        Box::pin(async move {
            let target = SshTarget::parse(&location.path).ok_or_else(|| {
                ProbeError::scm(format!(
                    "{} is not an SSH repository location",
                    mask_credentials(&location.path)
                ))
            })?;
            if !location.password.is_empty() {
                debug!("Ignoring password for {}; SSH checks use key authentication", target.host);
            }

            let hostname = target.known_hosts_name();
            let offered = self.scan_host_keys(&target).await?;
            let trusted = self
                .store
                .host_key(namespace, &hostname)
                .map_err(|e| ProbeError::Other(Box::new(e)))?;

            let trusted = match trusted {
                None => {
                    return Err(ProbeError::UnknownHostKey {
                        hostname,
                        key: preferred_key(offered),
                    });
                }
                Some(expected) if !offered.contains(&expected) => {
                    return Err(ProbeError::BadHostKey {
                        hostname,
                        key: preferred_key(offered),
                        expected_key: expected,
                    });
                }
                Some(expected) => expected,
            };

            self.ls_remote(&target, location, &trusted).await
        })
    }
}

/// Pick the key to report from those a server offered.
fn preferred_key(mut offered: Vec<HostKey>) -> HostKey {
    offered.sort_by_key(|key| {
        KEY_PREFERENCE
            .iter()
            .position(|alg| *alg == key.algorithm)
            .unwrap_or(KEY_PREFERENCE.len())
    });
    offered.swap_remove(0)
}

fn default_identities() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    ["id_ed25519", "id_ecdsa", "id_rsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .collect()
}

fn first_meaningful_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}

const NOT_FOUND_MARKERS: [&str; 3] = [
    "does not appear to be a git repository",
    "repository not found",
    "no such repository",
];

const TRANSPORT_MARKERS: [&str; 9] = [
    "could not resolve hostname",
    "connection refused",
    "connection timed out",
    "operation timed out",
    "no route to host",
    "network is unreachable",
    "connection closed by",
    "connection reset by",
    "kex_exchange_identification",
];

/// Map `git ls-remote` stderr to a probe failure.
pub fn classify_git_stderr(
    stderr: &str,
    path: &str,
    has_user_key: bool,
    exit_code: Option<i32>,
) -> ProbeError {
    for line in stderr.lines().map(str::trim) {
        if let Some(rest) = line.split("Permission denied (").nth(1) {
            let allowed_types = rest
                .split(')')
                .next()
                .unwrap_or_default()
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            return ProbeError::Authentication {
                reason: line.to_string(),
                allowed_types,
                has_user_key,
            };
        }
    }

    let lower = stderr.to_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
        return ProbeError::not_found(path);
    }
    if let Some(line) = stderr
        .lines()
        .map(str::trim)
        .find(|line| {
            let line = line.to_lowercase();
            TRANSPORT_MARKERS.iter().any(|m| line.contains(m))
        })
    {
        return ProbeError::ssh(line);
    }

    match first_meaningful_line(stderr) {
        Some(line) => ProbeError::scm(line),
        None => ProbeError::scm(format!(
            "git ls-remote exited with status {}",
            exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        )),
    }
}
