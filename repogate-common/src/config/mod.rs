//! Configuration for repogate.
//!
//! Values are resolved in three layers: built-in defaults, the TOML config
//! file, then `REPOGATE_*` environment variables.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::errors::ErrorCode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upper bound on probe attempts for one verification call.
pub const MAX_ATTEMPTS_LIMIT: u32 = 4;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("invalid environment: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Env(Vec<EnvError>),
}

impl ConfigError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Validation(_) => ErrorCode::ConfigValidationError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepogateConfig {
    pub general: GeneralConfig,
    pub verification: VerificationConfig,
    pub trust_store: TrustStoreConfig,
    pub ssh: SshConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Verification loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Per-attempt probe timeout.
    pub probe_timeout_secs: u64,
    /// Probe attempts per call, 1..=4.
    pub max_attempts: u32,
    /// Record unknown or changed host keys and certificates without asking.
    pub auto_trust: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
            max_attempts: MAX_ATTEMPTS_LIMIT,
            auto_trust: false,
        }
    }
}

impl VerificationConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustStoreConfig {
    /// Root directory of the file trust store.
    pub root: Option<PathBuf>,
}

impl TrustStoreConfig {
    /// Configured root, or the per-user data directory.
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_trust_root)
    }
}

/// External binaries and identity used by the git-over-SSH probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub identity_file: Option<PathBuf>,
    pub ssh_binary: String,
    pub keyscan_binary: String,
    pub git_binary: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            identity_file: None,
            ssh_binary: "ssh".to_string(),
            keyscan_binary: "ssh-keyscan".to_string(),
            git_binary: "git".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    15
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "repogate", "repogate")
}

/// `<config dir>/config.toml`, if a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<data dir>/trust`, falling back to `.repogate/trust` in the working directory.
pub fn default_trust_root() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("trust"))
        .unwrap_or_else(|| PathBuf::from(".repogate").join("trust"))
}

impl RepogateConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// used, and a missing file there yields defaults. Environment overrides
    /// are applied last and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        let applied = config.apply_env_overrides()?;
        if !applied.is_empty() {
            debug!("Applied environment overrides: {}", applied.join(", "));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply `REPOGATE_*` overrides. Returns the variables that were set.
    pub fn apply_env_overrides(&mut self) -> Result<Vec<String>, ConfigError> {
        let mut parser = EnvParser::new();
        let mut applied = Vec::new();

        let timeout =
            parser.get_u64_range("PROBE_TIMEOUT_SECS", self.verification.probe_timeout_secs, 1, 3600);
        let attempts =
            parser.get_u32_range("MAX_ATTEMPTS", self.verification.max_attempts, 1, MAX_ATTEMPTS_LIMIT);
        let auto_trust = parser.get_bool("AUTO_TRUST", self.verification.auto_trust);
        let log_level = parser.get_log_level("LOG_LEVEL", &self.general.log_level);
        let trust_root = parser.get_optional_path("TRUST_ROOT");
        let identity = parser.get_optional_path("SSH_IDENTITY");

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        self.verification.probe_timeout_secs = timeout.value;
        self.verification.max_attempts = attempts.value;
        self.verification.auto_trust = auto_trust.value;
        self.general.log_level = log_level.value;
        if trust_root.is_from_env() {
            self.trust_store.root = trust_root.value;
        }
        if identity.is_from_env() {
            self.ssh.identity_file = identity.value;
        }

        for var in [
            timeout.var,
            attempts.var,
            auto_trust.var,
            log_level.var,
            trust_root.var,
            identity.var,
        ]
        .into_iter()
        .flatten()
        {
            applied.push(var);
        }
        Ok(applied)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.verification;
        if v.max_attempts == 0 || v.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Validation(format!(
                "verification.max_attempts must be between 1 and {}, got {}",
                MAX_ATTEMPTS_LIMIT, v.max_attempts
            )));
        }
        if v.probe_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "verification.probe_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !matches!(
            self.general.log_level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error" | "off"
        ) {
            return Err(ConfigError::Validation(format!(
                "general.log_level '{}' is not a log level",
                self.general.log_level
            )));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}
