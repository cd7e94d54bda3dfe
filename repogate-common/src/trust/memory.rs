//! In-process trust store.

use super::{TrustEntry, TrustStore, TrustStoreError};
use crate::types::{Certificate, CertificateMetadata, HostKey, Namespace};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

type HostKeyMap = HashMap<(Namespace, String), HostKey>;
type CertificateMap = HashMap<(Namespace, String), CertificateMetadata>;

/// Trust store kept in memory.
///
/// Each map is guarded by a single lock, so mutations are atomic and
/// writers of the same key serialize.
#[derive(Debug, Default)]
pub struct MemoryTrustStore {
    host_keys: RwLock<HostKeyMap>,
    certificates: RwLock<CertificateMap>,
    mutations: AtomicU64,
    read_only: AtomicBool,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every mutation with [`TrustStoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of successful mutations since creation.
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), TrustStoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            Err(TrustStoreError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl TrustStore for MemoryTrustStore {
    fn host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
    ) -> Result<Option<HostKey>, TrustStoreError> {
        let keys = self.host_keys.read().unwrap_or_else(|e| e.into_inner());
        Ok(keys
            .get(&(namespace.clone(), hostname.to_string()))
            .cloned())
    }

    fn add_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        key: &HostKey,
    ) -> Result<(), TrustStoreError> {
        self.check_writable()?;
        let mut keys = self.host_keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert((namespace.clone(), hostname.to_string()), key.clone());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn replace_host_key(
        &self,
        namespace: &Namespace,
        hostname: &str,
        old_key: &HostKey,
        new_key: &HostKey,
    ) -> Result<(), TrustStoreError> {
        self.check_writable()?;
        let mut keys = self.host_keys.write().unwrap_or_else(|e| e.into_inner());
        let previous = keys.insert((namespace.clone(), hostname.to_string()), new_key.clone());
        if previous.as_ref() != Some(old_key) {
            debug!(
                "Replaced host key for {} in {} that was not the expected old key",
                hostname, namespace
            );
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn certificate(
        &self,
        namespace: &Namespace,
        path: &str,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError> {
        let certs = self.certificates.read().unwrap_or_else(|e| e.into_inner());
        Ok(certs.get(&(namespace.clone(), path.to_string())).cloned())
    }

    fn accept_certificate(
        &self,
        namespace: &Namespace,
        path: &str,
        certificate: &Certificate,
    ) -> Result<Option<CertificateMetadata>, TrustStoreError> {
        self.check_writable()?;
        let metadata = CertificateMetadata::accepted_now(certificate);
        let mut certs = self.certificates.write().unwrap_or_else(|e| e.into_inner());
        certs.insert((namespace.clone(), path.to_string()), metadata.clone());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(Some(metadata))
    }

    fn entries(&self, namespace: Option<&Namespace>) -> Result<Vec<TrustEntry>, TrustStoreError> {
        let wanted = |ns: &Namespace| namespace.is_none_or(|n| n == ns);
        let mut entries: Vec<TrustEntry> = Vec::new();

        let keys = self.host_keys.read().unwrap_or_else(|e| e.into_inner());
        for ((ns, hostname), key) in keys.iter().filter(|((ns, _), _)| wanted(ns)) {
            entries.push(TrustEntry::HostKey {
                namespace: ns.clone(),
                hostname: hostname.clone(),
                key: key.clone(),
            });
        }
        drop(keys);

        let certs = self.certificates.read().unwrap_or_else(|e| e.into_inner());
        for ((ns, path), metadata) in certs.iter().filter(|((ns, _), _)| wanted(ns)) {
            entries.push(TrustEntry::Certificate {
                namespace: ns.clone(),
                path: path.clone(),
                certificate: metadata.clone(),
            });
        }

        entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Ok(entries)
    }
}

fn sort_key(entry: &TrustEntry) -> (&Namespace, u8, &str) {
    match entry {
        TrustEntry::HostKey {
            namespace,
            hostname,
            ..
        } => (namespace, 0, hostname),
        TrustEntry::Certificate {
            namespace, path, ..
        } => (namespace, 1, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Validity;
    use std::sync::Arc;

    fn key(byte: u8) -> HostKey {
        HostKey::new("ssh-ed25519", vec![byte; 32])
    }

    #[test]
    fn test_add_and_lookup_scoped_by_namespace() {
        let store = MemoryTrustStore::new();
        let site_a = Namespace::named("site-a");

        store.add_host_key(&site_a, "git.example.com", &key(1)).unwrap();

        assert_eq!(
            store.host_key(&site_a, "git.example.com").unwrap(),
            Some(key(1))
        );
        assert_eq!(
            store
                .host_key(&Namespace::global(), "git.example.com")
                .unwrap(),
            None
        );
        assert_eq!(store.mutations(), 1);
    }

    #[test]
    fn test_replace_supersedes_previous_key() {
        let store = MemoryTrustStore::new();
        let ns = Namespace::global();
        store.add_host_key(&ns, "h", &key(1)).unwrap();
        store.replace_host_key(&ns, "h", &key(1), &key(2)).unwrap();

        assert_eq!(store.host_key(&ns, "h").unwrap(), Some(key(2)));
        assert_eq!(store.entries(Some(&ns)).unwrap().len(), 1);
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let store = MemoryTrustStore::new();
        store.set_read_only(true);
        let err = store
            .add_host_key(&Namespace::global(), "h", &key(1))
            .unwrap_err();
        assert!(matches!(err, TrustStoreError::ReadOnly));
        assert_eq!(store.mutations(), 0);
    }

    #[test]
    fn test_accept_certificate_returns_metadata() {
        let store = MemoryTrustStore::new();
        let ns = Namespace::named("site-b");
        let cert = Certificate {
            fingerprint: "AB:CD".to_string(),
            hostname: "svn.example.com".to_string(),
            issuer: "Example CA".to_string(),
            valid: Validity {
                from: "2026-01-01".to_string(),
                until: "2027-01-01".to_string(),
            },
            failures: vec!["self-signed".to_string()],
        };

        let metadata = store
            .accept_certificate(&ns, "https://svn.example.com/repo", &cert)
            .unwrap()
            .unwrap();
        assert_eq!(metadata.fingerprint, "AB:CD");
        assert_eq!(
            store
                .certificate(&ns, "https://svn.example.com/repo")
                .unwrap(),
            Some(metadata)
        );
    }

    #[test]
    fn test_concurrent_adds_leave_one_whole_key() {
        let store = Arc::new(MemoryTrustStore::new());
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

        let stored = store.host_key(&ns, "h").unwrap().unwrap();
        assert!((0..8u8).any(|i| stored == key(i)));
        assert_eq!(store.mutations(), 8);
    }

    #[test]
    fn test_entries_filtered_and_sorted() {
        let store = MemoryTrustStore::new();
        let a = Namespace::named("a");
        let b = Namespace::named("b");
        store.add_host_key(&b, "z", &key(1)).unwrap();
        store.add_host_key(&a, "y", &key(2)).unwrap();
        store.add_host_key(&a, "x", &key(3)).unwrap();

        let all = store.entries(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].namespace(), &a);

        let only_b = store.entries(Some(&b)).unwrap();
        assert_eq!(only_b.len(), 1);
    }
}
