//! Test probes.
//!
//! These never open network connections. [`ScriptedProbe`] replays a fixed
//! sequence of results; [`SimulatedSshServer`] behaves like a host with a
//! fixed host key and checks it against a trust store on every call.

use crate::probe::{Probe, ProbeError};
use crate::trust::TrustStore;
use crate::types::{HostKey, Namespace, RepositoryLocation};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Fallback = Box<dyn Fn() -> Result<(), ProbeError> + Send + Sync>;

/// Probe that returns scripted results in order, then a fallback forever.
pub struct ScriptedProbe {
    name: String,
    script: Mutex<VecDeque<Result<(), ProbeError>>>,
    fallback: Fallback,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    /// Succeeds on every call.
    pub fn always_ok() -> Self {
        Self::repeating(|| Ok(()))
    }

    /// Produces the same result on every call once the script is used up.
    pub fn repeating<F>(fallback: F) -> Self
    where
        F: Fn() -> Result<(), ProbeError> + Send + Sync + 'static,
    {
        Self {
            name: "scripted".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Box::new(fallback),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails with `error` on the next unscripted call.
    pub fn then_err(self, error: ProbeError) -> Self {
        self.push(Err(error))
    }

    /// Succeeds on the next unscripted call.
    pub fn then_ok(self) -> Self {
        self.push(Ok(()))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `check_reachable` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(self, result: Result<(), ProbeError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
        self
    }

    fn next_result(&self) -> Result<(), ProbeError> {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        scripted.unwrap_or_else(|| (self.fallback)())
    }
}

impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_reachable<'a>(
        &'a self,
        _location: &'a RepositoryLocation,
        _namespace: &'a Namespace,
    ) -> BoxFuture<'a, Result<(), ProbeError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next_result()
        })
    }
}

/// A host presenting a fixed key, checked against a trust store per call.
///
/// Reports `UnknownHostKey` when the store has no key for the host,
/// `BadHostKey` when it holds a different one, and success otherwise.
pub struct SimulatedSshServer {
    hostname: String,
    key: Mutex<HostKey>,
    store: Arc<dyn TrustStore>,
    calls: AtomicUsize,
}

impl SimulatedSshServer {
    pub fn new(hostname: impl Into<String>, key: HostKey, store: Arc<dyn TrustStore>) -> Self {
        Self {
            hostname: hostname.into(),
            key: Mutex::new(key),
            store,
            calls: AtomicUsize::new(0),
        }
    }

    /// Simulate a host key rotation.
    pub fn rotate_key(&self, key: HostKey) {
        *self.key.lock().unwrap_or_else(|e| e.into_inner()) = key;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for SimulatedSshServer {
    fn name(&self) -> &str {
        "simulated-ssh"
    }

    fn check_reachable<'a>(
        &'a self,
        _location: &'a RepositoryLocation,
        namespace: &'a Namespace,
    ) -> BoxFuture<'a, Result<(), ProbeError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let offered = self.key.lock().unwrap_or_else(|e| e.into_inner()).clone();
            let trusted = self
                .store
                .host_key(namespace, &self.hostname)
                .map_err(|e| ProbeError::Other(Box::new(e)))?;
            match trusted {
                None => Err(ProbeError::UnknownHostKey {
                    hostname: self.hostname.clone(),
                    key: offered,
                }),
                Some(expected) if expected != offered => Err(ProbeError::BadHostKey {
                    hostname: self.hostname.clone(),
                    key: offered,
                    expected_key: expected,
                }),
                Some(_) => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::MemoryTrustStore;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let probe = ScriptedProbe::always_ok().then_err(ProbeError::ssh("refused"));
        let location = RepositoryLocation::new("ssh://h/r");
        let ns = Namespace::global();

        assert!(matches!(
            probe.check_reachable(&location, &ns).await,
            Err(ProbeError::Ssh { .. })
        ));
        assert!(probe.check_reachable(&location, &ns).await.is_ok());
        assert!(probe.check_reachable(&location, &ns).await.is_ok());
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_simulated_server_follows_store() {
        let store = Arc::new(MemoryTrustStore::new());
        let key = HostKey::new("ssh-ed25519", vec![7; 32]);
        let server = SimulatedSshServer::new("git.example.com", key.clone(), store.clone());
        let location = RepositoryLocation::new("ssh://git.example.com/r");
        let ns = Namespace::named("a");

        assert!(matches!(
            server.check_reachable(&location, &ns).await,
            Err(ProbeError::UnknownHostKey { .. })
        ));
        store.add_host_key(&ns, "git.example.com", &key).unwrap();
        assert!(server.check_reachable(&location, &ns).await.is_ok());

        server.rotate_key(HostKey::new("ssh-ed25519", vec![8; 32]));
        assert!(matches!(
            server.check_reachable(&location, &ns).await,
            Err(ProbeError::BadHostKey { ref expected_key, .. }) if *expected_key == key
        ));
        assert_eq!(server.calls(), 3);
    }
}
