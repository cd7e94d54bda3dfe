use repogate_common::types::HostKey;
use repogate_common::{Certificate, RepositoryLocation, Validity};

pub fn host_key(byte: u8) -> HostKey {
    HostKey::new("ssh-ed25519", vec![byte; 32])
}

pub fn location() -> RepositoryLocation {
    RepositoryLocation::new("ssh://git.example.com/srv/app.git").with_username("ci")
}

pub fn self_signed_certificate() -> Certificate {
    Certificate {
        fingerprint: "6B:2E:90:0C".to_string(),
        hostname: "svn.example.com".to_string(),
        issuer: "svn.example.com".to_string(),
        valid: Validity {
            from: "2026-03-01T00:00:00Z".to_string(),
            until: "2028-03-01T00:00:00Z".to_string(),
        },
        failures: vec!["self-signed".to_string()],
    }
}
