//! Per-repository index cache
//!
//! Each repository's index is stored in its own file,
//! `<cache>/<name>-index.yaml`, so refreshes never contend with each other or
//! with the shared repository file.

use std::path::{Path, PathBuf};

use crate::config::write_atomic;
use crate::error::{RepoError, Result};
use crate::index::ChartIndex;

#[derive(Debug, Clone)]
pub struct IndexCache {
    dir: PathBuf,
}

impl IndexCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for a repository
    pub fn path(&self, repo_name: &str) -> PathBuf {
        self.dir.join(format!("{}-index.yaml", repo_name))
    }

    /// Store a repository's index
    pub fn store(&self, repo_name: &str, index: &ChartIndex) -> Result<PathBuf> {
        let path = self.path(repo_name);
        write_atomic(&path, index.to_yaml()?.as_bytes())?;
        tracing::debug!(repo = repo_name, path = %path.display(), "cached repository index");
        Ok(path)
    }

    /// Load a repository's cached index
    pub fn load(&self, repo_name: &str) -> Result<ChartIndex> {
        let path = self.path(repo_name);
        match std::fs::read(&path) {
            Ok(bytes) => ChartIndex::from_bytes(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepoError::IndexNotCached {
                name: repo_name.to_string(),
            }),
            Err(e) => Err(RepoError::filesystem(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChartVersion;

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path().join("repository"));

        let mut index = ChartIndex::default();
        index.add_entry(ChartVersion {
            name: "consul".to_string(),
            version: "1.3.0".to_string(),
            ..Default::default()
        });

        let path = cache.store("hashicorp", &index).unwrap();
        assert_eq!(path, dir.path().join("repository/hashicorp-index.yaml"));

        let loaded = cache.load("hashicorp").unwrap();
        assert_eq!(loaded.get_latest("consul").unwrap().version, "1.3.0");
    }

    #[test]
    fn test_missing_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        assert!(matches!(cache.load("nope"), Err(RepoError::IndexNotCached { .. })));
    }
}
