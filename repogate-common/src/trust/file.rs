//! Trust store persisted on disk.
//!
//! Layout, one directory per namespace under the root:
//!
//! ```text
//! <root>/_global/known_hosts
//! <root>/_global/certificates.json
//! <root>/ns-site-a-1f2e3d4c/namespace
//! <root>/ns-site-a-1f2e3d4c/known_hosts
//! ```
//!
//! `known_hosts` uses the OpenSSH format (`hostname algorithm base64`) so it
//! can be handed straight to `ssh -o UserKnownHostsFile=...`. Writes go to a
//! temporary file in the same directory and are renamed into place.

use super::{TrustEntry, TrustStore, TrustStoreError};
use crate::types::{Certificate, CertificateMetadata, HostKey, Namespace};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const GLOBAL_DIR: &str = "_global";
const NAMESPACE_FILE: &str = "namespace";
const KNOWN_HOSTS_FILE: &str = "known_hosts";
const CERTIFICATES_FILE: &str = "certificates.json";

/// Directory-backed trust store.
#[derive(Debug)]
pub struct FileTrustStore {
    root: PathBuf,
    /// Per-namespace write locks. Readers never lock.
    locks: Mutex<HashMap<Namespace, Arc<Mutex<()>>>>,
}

impl FileTrustStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the known_hosts file for `namespace`.
    pub fn known_hosts_path(&self, namespace: &Namespace) -> PathBuf {
        self.namespace_dir(namespace).join(KNOWN_HOSTS_FILE)
    }

    fn certificates_path(&self, namespace: &Namespace) -> PathBuf {
        self.namespace_dir(namespace).join(CERTIFICATES_FILE)
    }

    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(namespace_dir_name(namespace))
    }

    fn namespace_lock(&self, namespace: &Namespace) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(namespace.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn ensure_namespace_dir(&self, namespace: &Namespace) -> Result<PathBuf, TrustStoreError> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).map_err(|e| TrustStoreError::io("create", &dir, e))?;

        if let Some(name) = namespace.as_deref() {
            let marker = dir.join(NAMESPACE_FILE);
            if !marker.exists() {
                write_atomic(&marker, name.as_bytes())?;
            }
        }
        Ok(dir)
    }

    fn read_known_hosts(&self, namespace: &Namespace) -> Result<Vec<(String, HostKey)>, TrustStoreError> {
        let path = self.known_hosts_path(namespace);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(parse_known_hosts(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(TrustStoreError::io("read", path, e)),
        }
    }

    fn write_known_hosts(
        &self,
        namespace: &Namespace,
        entries: &[(String, HostKey)],
    ) -> Result<(), TrustStoreError> {
        self.ensure_namespace_dir(namespace)?;
        write_atomic(
            &self.known_hosts_path(namespace),
            format_known_hosts(entries).as_bytes(),
        )
    }

    fn read_certificates(
        &self,
        namespace: &Namespace,
    ) -> Result<BTreeMap<String, CertificateMetadata>, TrustStoreError> {
        let path = self.certificates_path(namespace);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| TrustStoreError::Corrupt {
                path,
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(TrustStoreError::io("read", path, e)),
        }
    }

    /// Set the key for `hostname`, dropping any previous entry for it.
    fn upsert_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        key: &HostKey,
    ) -> Result<Option<HostKey>, TrustStoreError> {
        let lock = self.namespace_lock(namespace);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = self.read_known_hosts(namespace)?;
        let previous = entries
            .iter()
            .position(|(host, _)| host == hostname)
            .map(|idx| entries.remove(idx).1);
        entries.retain(|(host, _)| host != hostname);
        entries.push((hostname.to_string(), key.clone()));
        self.write_known_hosts(namespace, &entries)?;
        Ok(previous)
    }

    fn load_namespace(&self, dir: &Path) -> Option<Namespace> {
        let name = dir.file_name()?.to_str()?;
        if name == GLOBAL_DIR {
            return Some(Namespace::global());
        }
        match fs::read_to_string(dir.join(NAMESPACE_FILE)) {
            Ok(content) => Some(Namespace::named(content)),
            Err(e) => {
                warn!("Skipping trust directory {}: {}", dir.display(), e);
                None
            }
        }
    }

    fn namespace_entries(&self, namespace: &Namespace) -> Result<Vec<TrustEntry>, TrustStoreError> {
        let mut entries = Vec::new();
        for (hostname, key) in self.read_known_hosts(namespace)? {
            entries.push(TrustEntry::HostKey {
                namespace: namespace.clone(),
                hostname,
                key,
            });
        }
        for (path, certificate) in self.read_certificates(namespace)? {
            entries.push(TrustEntry::Certificate {
                namespace: namespace.clone(),
                path,
                certificate,
            });
        }
        Ok(entries)
    }
}

impl TrustStore for FileTrustStore {
    fn host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
    ) -> Result<Option<HostKey>, TrustStoreError> {
        Ok(self
            .read_known_hosts(namespace)?
            .into_iter()
            .find(|(host, _)| host == hostname)
            .map(|(_, key)| key))
    }

    fn add_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        key: &HostKey,
    ) -> Result<(), TrustStoreError> {
        let previous = self.upsert_host_key(namespace, hostname, key)?;
        if previous.is_some() {
            debug!("Host key for {} in {} was already present; overwritten", hostname, namespace);
        }
        Ok(())
    }

    fn replace_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        old_key: &HostKey,
        new_key: &HostKey,
    ) -> Result<(), TrustStoreError> {
        let previous = self.upsert_host_key(namespace, hostname, new_key)?;
        if previous.as_ref() != Some(old_key) {
            debug!(
                "Replaced host key for {} in {} that was not the expected old key",
                hostname, namespace
            );
        }
        Ok(())
    }

    fn certificate(
        &self,
        namespace: &Namespace,
        path: &str,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError> {
        Ok(self.read_certificates(namespace)?.remove(path))
    }

    fn accept_certificate(
        &self,
        namespace: &Namespace,
        path: &str,
        certificate: &Certificate,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError> {
        let lock = self.namespace_lock(namespace);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let metadata = CertificateMetadata::accepted_now(certificate);
        let mut certs = self.read_certificates(namespace)?;
        certs.insert(path.to_string(), metadata.clone());

        self.ensure_namespace_dir(namespace)?;
        let json = serde_json::to_vec_pretty(&certs).map_err(|e| TrustStoreError::Corrupt {
            path: self.certificates_path(namespace),
            reason: e.to_string(),
        })?;
        write_atomic(&self.certificates_path(namespace), &json)?;
        Ok(Some(metadata))
    }

    fn entries(&self, namespace: Option<&Namespace>) -> Result<Vec<TrustEntry>, TrustStoreError> {
        if let Some(namespace) = namespace {
            return self.namespace_entries(namespace);
        }

        let dirs = match fs::read_dir(&self.root) {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrustStoreError::io("list", &self.root, e)),
        };

        let mut namespaces: Vec<Namespace> = dirs
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| self.load_namespace(&entry.path()))
            .collect();
        namespaces.sort();

        let mut entries = Vec::new();
        for namespace in &namespaces {
            entries.extend(self.namespace_entries(namespace)?);
        }
        Ok(entries)
    }
}

/// Directory name for a namespace. Named scopes get a readable prefix plus
/// a digest so distinct names never share a directory.
fn namespace_dir_name(namespace: &Namespace) -> String {
    let Some(name) = namespace.as_deref() else {
        return GLOBAL_DIR.to_string();
    };

    let readable: String = name
        .chars()
        .take(32)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(name.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    format!("ns-{}-{}", readable, suffix)
}

/// Parse known_hosts content. Comments, hashed hosts and malformed lines
/// are skipped; a comma-separated host list yields one entry per host.
pub fn parse_known_hosts(content: &str) -> Vec<(String, HostKey)> {
    let mut entries = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('|') || line.starts_with('@') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(hosts), Some(algorithm), Some(encoded)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let Ok(key) = HostKey::from_openssh(algorithm, encoded) else {
            debug!("Skipping known_hosts line with undecodable key for {}", hosts);
            continue;
        };

        for host in hosts.split(',').filter(|h| !h.is_empty()) {
            entries.push((host.to_string(), key.clone()));
        }
    }
    entries
}

pub fn format_known_hosts(entries: &[(String, HostKey)]) -> String {
    let mut out = String::new();
    for (host, key) in entries {
        out.push_str(&format!("{} {}\n", host, key));
    }
    out
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TrustStoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| TrustStoreError::io("create temp file in", dir, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| TrustStoreError::io("write", tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| TrustStoreError::io("replace", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Validity;

    fn key(byte: u8) -> HostKey {
        HostKey::new("ssh-ed25519", vec![byte; 32])
    }

    fn certificate() -> Certificate {
        Certificate {
            fingerprint: "12:34:56".to_string(),
            hostname: "svn.example.com".to_string(),
            issuer: "Self".to_string(),
            valid: Validity {
                from: "2026-01-01T00:00:00Z".to_string(),
                until: "2026-12-31T00:00:00Z".to_string(),
            },
            failures: vec!["self-signed".to_string(), "expired".to_string()],
        }
    }

    #[test]
    fn test_parse_known_hosts_skips_noise() {
        let k = key(7);
        let content = format!(
            "# comment\n\n|1|hashed|entry ssh-rsa AAAA\nalpha,beta {}\nbroken-line\ngamma ssh-rsa !!!\n",
            k
        );
        let entries = parse_known_hosts(&content);
        assert_eq!(
            entries,
            vec![("alpha".to_string(), k.clone()), ("beta".to_string(), k)]
        );
    }

    #[test]
    fn test_namespace_dir_names_are_distinct_and_safe() {
        let a = namespace_dir_name(&Namespace::named("a/b"));
        let b = namespace_dir_name(&Namespace::named("a_b"));
        assert_ne!(a, b);
        assert!(!a.contains('/'));
        assert_eq!(namespace_dir_name(&Namespace::global()), "_global");
    }

    #[test]
    fn test_host_keys_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::named("site-a");

        let store = FileTrustStore::new(dir.path());
        assert_eq!(store.host_key(&ns, "git.example.com").unwrap(), None);
        store.add_host_key(&ns, "git.example.com", &key(1)).unwrap();

        let reopened = FileTrustStore::new(dir.path());
        assert_eq!(
            reopened.host_key(&ns, "git.example.com").unwrap(),
            Some(key(1))
        );
        assert_eq!(
            reopened
                .host_key(&Namespace::global(), "git.example.com")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_unfiltered_entries_include_padded_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path());
        let ns = Namespace::named(" site-a ");
        store.add_host_key(&ns, "git.example.com", &key(2)).unwrap();

        let scoped = store.entries(Some(&ns)).unwrap();
        let all = FileTrustStore::new(dir.path()).entries(None).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(all, scoped);
        assert_eq!(all[0].namespace(), &Namespace::named("site-a"));
    }

    #[test]
    fn test_replace_keeps_single_record_per_host() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path());
        let ns = Namespace::global();

        store.add_host_key(&ns, "h1", &key(1)).unwrap();
        store.add_host_key(&ns, "h2", &key(2)).unwrap();
        store.replace_host_key(&ns, "h1", &key(1), &key(3)).unwrap();

        let content = fs::read_to_string(store.known_hosts_path(&ns)).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with("h1 ")).count(), 1);
        assert_eq!(store.host_key(&ns, "h1").unwrap(), Some(key(3)));
        assert_eq!(store.host_key(&ns, "h2").unwrap(), Some(key(2)));
    }

    #[test]
    fn test_accept_certificate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path());
        let ns = Namespace::named("tenant");

        let metadata = store
            .accept_certificate(&ns, "https://svn.example.com/repo", &certificate())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.failures.len(), 2);

        let stored = store
            .certificate(&ns, "https://svn.example.com/repo")
            .unwrap();
        assert_eq!(stored, Some(metadata));
    }

    #[test]
    fn test_entries_lists_every_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path());
        store
            .add_host_key(&Namespace::global(), "h", &key(1))
            .unwrap();
        store
            .add_host_key(&Namespace::named("site-a"), "h", &key(2))
            .unwrap();
        store
            .accept_certificate(&Namespace::named("site-a"), "https://x/repo", &certificate())
            .unwrap();

        let all = store.entries(None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(
            all.iter()
                .any(|e| e.namespace() == &Namespace::named("site-a"))
        );

        let scoped = store.entries(Some(&Namespace::global())).unwrap();
        assert_eq!(scoped.len(), 1);
    }

    #[test]
    fn test_entries_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path().join("does-not-exist"));
        assert!(store.entries(None).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_certificates_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path());
        let ns = Namespace::global();
        fs::create_dir_all(dir.path().join(GLOBAL_DIR)).unwrap();
        fs::write(store.certificates_path(&ns), "{ not json").unwrap();

        let err = store.certificate(&ns, "anything").unwrap_err();
        assert!(matches!(err, TrustStoreError::Corrupt { .. }));
    }

    #[test]
    fn test_concurrent_adds_same_host_never_mix() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTrustStore::new(dir.path()));
        let ns = Namespace::named("race");

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = store.clone();
                let ns = ns.clone();
                std::thread::spawn(move || store.add_host_key(&ns, "h", &key(i)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = parse_known_hosts(&fs::read_to_string(store.known_hosts_path(&ns)).unwrap());
        assert_eq!(entries.len(), 1);
        assert!((0..8u8).any(|i| entries[0].1 == key(i)));
    }
}
