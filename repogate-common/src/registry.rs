//! Repository registration workflow.
//!
//! An in-memory repository registry that verifies access before saving a
//! repository or changing how it is reached. Accepted certificate metadata
//! is kept in the repository's `extra_data["cert"]`.

use crate::api::ApiError;
use crate::outcome::VerificationOutcome;
use crate::probe::ToolRegistry;
use crate::types::{Namespace, RepositoryLocation, Secret, TrustDecision};
use crate::util::mask_credentials;
use crate::verify::{RepositoryVerifier, VerifyError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;

/// Characters of the original name kept by [`archive_name`].
const ARCHIVE_NAME_PREFIX_CHARS: usize = 50;

/// A registered repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub mirror_path: String,
    pub raw_file_url: String,
    pub username: String,
    #[serde(skip)]
    pub password: Secret,
    pub tool: String,
    pub bug_tracker: String,
    pub encoding: String,
    pub public: bool,
    pub visible: bool,
    pub namespace: Namespace,
    pub extra_data: Map<String, Value>,
}

impl Repository {
    pub fn location(&self) -> RepositoryLocation {
        RepositoryLocation::new(self.path.clone())
            .with_username(self.username.clone())
            .with_password(self.password.clone())
    }
}

/// Fields for a new repository.
#[derive(Debug, Clone, Default)]
pub struct NewRepository {
    pub name: String,
    pub path: String,
    pub tool: String,
    pub namespace: Namespace,
    pub mirror_path: Option<String>,
    pub raw_file_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub bug_tracker: Option<String>,
    pub encoding: Option<String>,
    /// Defaults to true.
    pub public: Option<bool>,
    /// Defaults to true.
    pub visible: Option<bool>,
}

/// Fields to change on an existing repository. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct RepositoryChanges {
    pub name: Option<String>,
    pub path: Option<String>,
    pub mirror_path: Option<String>,
    pub raw_file_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub bug_tracker: Option<String>,
    pub encoding: Option<String>,
    pub public: Option<bool>,
    pub visible: Option<bool>,
    /// Rename to a name that won't collide with future repositories.
    pub archive_name: bool,
}

impl RepositoryChanges {
    /// Whether the change affects how the repository is reached.
    pub fn touches_access(&self) -> bool {
        self.path.is_some() || self.username.is_some() || self.password.is_some()
    }
}

/// What `delete` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// Dependent records exist, so the repository was only hidden.
    Hidden,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("repository {0} does not exist")]
    DoesNotExist(u64),

    #[error("'{0}' is not a valid tool")]
    UnknownTool(String),

    #[error("repository check failed: {0}")]
    Verification(VerificationOutcome),

    #[error(transparent)]
    Unclassified(#[from] VerifyError),

    #[error("failed to store certificate metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::DoesNotExist(_) => ApiError::does_not_exist(),
            Self::UnknownTool(_) => {
                let mut fields = BTreeMap::new();
                fields.insert(
                    "tool".to_string(),
                    vec!["This is not a valid SCMTool".to_string()],
                );
                ApiError::invalid_form(fields)
            }
            Self::Verification(outcome) => ApiError::from_outcome(outcome)
                .unwrap_or_else(|| ApiError::serialization("verification succeeded")),
            Self::Unclassified(err) => ApiError::internal(err),
            Self::Serialization(err) => ApiError::serialization(err.to_string()),
        }
    }
}

impl From<&RegistryError> for ApiError {
    fn from(err: &RegistryError) -> Self {
        err.to_api_error()
    }
}

/// `ar:<first 50 chars of name>:<unix seconds in hex>`. Fits in 64 characters.
pub fn archive_name(name: &str, now: DateTime<Utc>) -> String {
    let prefix: String = name.chars().take(ARCHIVE_NAME_PREFIX_CHARS).collect();
    format!("ar:{}:{:x}", prefix, now.timestamp().max(0))
}

/// In-memory repository registry.
pub struct RepositoryRegistry {
    verifier: RepositoryVerifier,
    tools: ToolRegistry,
    repositories: RwLock<BTreeMap<u64, Repository>>,
    dependents: RwLock<HashMap<u64, usize>>,
    next_id: AtomicU64,
}

impl RepositoryRegistry {
    pub fn new(verifier: RepositoryVerifier, tools: ToolRegistry) -> Self {
        Self {
            verifier,
            tools,
            repositories: RwLock::new(BTreeMap::new()),
            dependents: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Verify access and save a new repository.
    pub async fn create(
        &self,
        request: NewRepository,
        trust_host: bool,
    ) -> Result<Repository, RegistryError> {
        let mut repository = Repository {
            id: 0,
            name: request.name,
            path: request.path,
            mirror_path: request.mirror_path.unwrap_or_default(),
            raw_file_url: request.raw_file_url.unwrap_or_default(),
            username: request.username.unwrap_or_default(),
            password: request.password.unwrap_or_default(),
            tool: request.tool,
            bug_tracker: request.bug_tracker.unwrap_or_default(),
            encoding: request.encoding.unwrap_or_default(),
            public: request.public.unwrap_or(true),
            visible: request.visible.unwrap_or(true),
            namespace: request.namespace,
            extra_data: Map::new(),
        };

        self.check_access(&mut repository, trust_host).await?;

        repository.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!(
            "Created repository {} ({}) in {}",
            repository.id,
            mask_credentials(&repository.path),
            repository.namespace
        );
        self.write_repositories()
            .insert(repository.id, repository.clone());
        Ok(repository)
    }

    /// Apply `changes`, re-verifying access if the path or credentials
    /// changed. Nothing is saved when verification fails.
    pub async fn update(
        &self,
        namespace: &Namespace,
        id: u64,
        changes: RepositoryChanges,
        trust_host: bool,
    ) -> Result<Repository, RegistryError> {
        let mut repository = self.get(namespace, id)?;
        let reverify = changes.touches_access();

        let RepositoryChanges {
            name,
            path,
            mirror_path,
            raw_file_url,
            username,
            password,
            bug_tracker,
            encoding,
            public,
            visible,
            archive_name: archive,
        } = changes;
        set_if_some(&mut repository.name, name);
        set_if_some(&mut repository.path, path);
        set_if_some(&mut repository.mirror_path, mirror_path);
        set_if_some(&mut repository.raw_file_url, raw_file_url);
        set_if_some(&mut repository.username, username);
        set_if_some(&mut repository.password, password);
        set_if_some(&mut repository.bug_tracker, bug_tracker);
        set_if_some(&mut repository.encoding, encoding);
        set_if_some(&mut repository.public, public);
        set_if_some(&mut repository.visible, visible);

        if reverify {
            self.check_access(&mut repository, trust_host).await?;
        }
        if archive {
            repository.name = archive_name(&repository.name, Utc::now());
        }

        let mut repositories = self.write_repositories();
        if !repositories.contains_key(&id) {
            return Err(RegistryError::DoesNotExist(id));
        }
        repositories.insert(id, repository.clone());
        Ok(repository)
    }

    /// Delete a repository, or hide it if other records depend on it.
    pub fn delete(&self, namespace: &Namespace, id: u64) -> Result<Deletion, RegistryError> {
        let mut repositories = self.write_repositories();
        let repository = repositories
            .get_mut(&id)
            .filter(|r| &r.namespace == namespace)
            .ok_or(RegistryError::DoesNotExist(id))?;

        if self.dependent_count(id) == 0 {
            repositories.remove(&id);
            info!("Deleted repository {}", id);
            Ok(Deletion::Deleted)
        } else {
            repository.visible = false;
            info!("Hid repository {} because other records depend on it", id);
            Ok(Deletion::Hidden)
        }
    }

    pub fn get(&self, namespace: &Namespace, id: u64) -> Result<Repository, RegistryError> {
        self.read_repositories()
            .get(&id)
            .filter(|r| &r.namespace == namespace)
            .cloned()
            .ok_or(RegistryError::DoesNotExist(id))
    }

    /// Repositories in `namespace`, ordered by ID.
    pub fn list(&self, namespace: &Namespace, show_invisible: bool) -> Vec<Repository> {
        self.read_repositories()
            .values()
            .filter(|r| &r.namespace == namespace && (show_invisible || r.visible))
            .cloned()
            .collect()
    }

    /// Record that another object (e.g. a review) refers to repository `id`.
    pub fn add_dependent(&self, id: u64) {
        *self
            .dependents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id)
            .or_insert(0) += 1;
    }

    fn dependent_count(&self, id: u64) -> usize {
        self.dependents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    async fn check_access(
        &self,
        repository: &mut Repository,
        trust_host: bool,
    ) -> Result<(), RegistryError> {
        let probe = self
            .tools
            .get(&repository.tool)
            .ok_or_else(|| RegistryError::UnknownTool(repository.tool.clone()))?;

        let outcome = self
            .verifier
            .verify(
                probe.as_ref(),
                &repository.location(),
                TrustDecision::from(trust_host),
                &repository.namespace,
            )
            .await?;

        match outcome {
            VerificationOutcome::Success {
                accepted_certificate: Some(metadata),
            } => {
                repository
                    .extra_data
                    .insert("cert".to_string(), serde_json::to_value(metadata)?);
                Ok(())
            }
            VerificationOutcome::Success { .. } => Ok(()),
            other => Err(RegistryError::Verification(other)),
        }
    }

    fn read_repositories(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<u64, Repository>> {
        self.repositories.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_repositories(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<u64, Repository>> {
        self.repositories.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn set_if_some<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}
