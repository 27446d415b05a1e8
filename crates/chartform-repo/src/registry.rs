//! Repository registration
//!
//! Adding a repository validates that its index can be fetched, caches that
//! index, and upserts the entry into the repository file, all while holding
//! the repository file lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chartform_core::Settings;

use crate::cache::IndexCache;
use crate::config::{RepositoryEntry, RepositoryFile};
use crate::error::{RepoError, Result};
use crate::getter::Getter;
use crate::lock::{LockOptions, with_lock};

/// What [`Registry::add`] did to the repository file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was appended
    Added,

    /// An entry with the same name and URL already existed
    AlreadyRegistered,

    /// An entry with the same name pointed elsewhere and was replaced
    Replaced { previous_url: String },
}

/// Registered repositories, backed by the repository file
pub struct Registry {
    config_path: PathBuf,
    cache: IndexCache,
    lock: LockOptions,
    fetch_timeout: Duration,
    getter: Arc<dyn Getter>,
}

impl Registry {
    pub fn new(settings: &Settings, getter: Arc<dyn Getter>) -> Self {
        Self {
            config_path: settings.repository_config.clone(),
            cache: IndexCache::new(&settings.repository_cache),
            lock: LockOptions::from(settings),
            fetch_timeout: settings.fetch_timeout,
            getter,
        }
    }

    /// Path of the repository file
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Register a repository
    ///
    /// Registering the same name twice leaves a single entry; the later URL
    /// wins. The repository must be reachable: its index is fetched and
    /// cached before the file is written.
    pub async fn add(&self, entry: RepositoryEntry) -> Result<AddOutcome> {
        entry.validate()?;

        with_lock(&self.config_path, &self.lock, || async {
            let mut file = RepositoryFile::load(&self.config_path)?;

            if let Some(existing) = file.get(&entry.name) {
                tracing::info!(
                    repo = %entry.name,
                    url = %existing.url,
                    "repository name already exists"
                );
            }

            let fetch = self.getter.fetch_index(&entry);
            let index = match tokio::time::timeout(self.fetch_timeout, fetch).await {
                Ok(Ok(index)) => index,
                Ok(Err(e)) => return Err(unreachable(&entry, e.to_string())),
                Err(_) => {
                    return Err(unreachable(
                        &entry,
                        format!("timed out after {:?}", self.fetch_timeout),
                    ));
                }
            };
            self.cache.store(&entry.name, &index)?;

            let outcome = match file.upsert(entry.clone()) {
                None => AddOutcome::Added,
                Some(previous) if previous.url == entry.url => AddOutcome::AlreadyRegistered,
                Some(previous) => AddOutcome::Replaced {
                    previous_url: previous.url,
                },
            };
            if outcome != AddOutcome::AlreadyRegistered {
                file.save(&self.config_path)?;
            }

            tracing::debug!(
                repo = %entry.name,
                url = %entry.url,
                ?outcome,
                "repository registered"
            );
            Ok(outcome)
        })
        .await
    }

    /// All registered repositories, in registration order
    pub fn list(&self) -> Result<Vec<RepositoryEntry>> {
        Ok(RepositoryFile::load(&self.config_path)?.repositories)
    }

    /// Look up one registered repository
    pub fn get(&self, name: &str) -> Result<RepositoryEntry> {
        self.list()?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RepoError::RepositoryNotFound {
                name: name.to_string(),
            })
    }
}

fn unreachable(entry: &RepositoryEntry, reason: String) -> RepoError {
    RepoError::UnreachableRepository {
        name: entry.name.clone(),
        url: entry.url.clone(),
        reason,
    }
}
