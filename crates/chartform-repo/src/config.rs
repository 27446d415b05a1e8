//! Repository file management
//!
//! The repository file (by default `~/.config/chartform/repositories.yaml`)
//! lists every registered repository by name. It carries no timestamps, so
//! the same set of repositories always serializes to the same bytes.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::error::{RepoError, Result};

/// Repository file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryFile {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Registered repositories, in registration order
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

fn default_api_version() -> String {
    "chartform.io/v1".to_string()
}

impl Default for RepositoryFile {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            repositories: Vec::new(),
        }
    }
}

impl RepositoryFile {
    /// Load the file; a missing or empty file is an empty collection
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(RepoError::filesystem(path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let file: Option<Self> = serde_yaml::from_str(&content)?;
        Ok(file.unwrap_or_default())
    }

    /// Write the file atomically: a temp file in the same directory is
    /// renamed over the target
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        write_atomic(path, content.as_bytes())
    }

    /// Get a repository by name
    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Insert or replace by name, returning the replaced entry
    pub fn upsert(&mut self, entry: RepositoryEntry) -> Option<RepositoryEntry> {
        match self.repositories.iter_mut().find(|r| r.name == entry.name) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.repositories.push(entry);
                None
            }
        }
    }

    /// List all repository names
    pub fn names(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.name.as_str()).collect()
    }
}

/// A registered repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Unique name for this repository
    pub name: String,

    /// Repository URL (HTTP(S), `file://` or an absolute path)
    pub url: String,
}

impl RepositoryEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Check the name and URL are usable
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RepoError::InvalidRepositoryName {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }
        if self.name.contains(['/', '\\']) || self.name.chars().any(char::is_whitespace) {
            return Err(RepoError::InvalidRepositoryName {
                name: self.name.clone(),
                reason: "name must not contain slashes or whitespace".to_string(),
            });
        }
        RepositoryKind::detect(&self.url)?;
        Ok(())
    }

    /// Kind of repository behind the URL
    pub fn kind(&self) -> Result<RepositoryKind> {
        RepositoryKind::detect(&self.url)
    }

    /// Location of the repository's `index.yaml`
    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.url.trim_end_matches('/'))
    }
}

/// Repository transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    /// HTTP(S) repository serving `index.yaml`
    Http,

    /// Local directory holding `index.yaml`
    File,
}

impl RepositoryKind {
    /// Detect the repository kind from its URL
    pub fn detect(url: &str) -> Result<Self> {
        if url.starts_with("http://") || url.starts_with("https://") {
            url::Url::parse(url).map_err(|e| RepoError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            Ok(RepositoryKind::Http)
        } else if url.starts_with("file://") || Path::new(url).is_absolute() {
            Ok(RepositoryKind::File)
        } else {
            Err(RepoError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: "URL must start with http://, https://, file://, or be an absolute path"
                    .to_string(),
            })
        }
    }
}

/// Write `data` to `path` through a temp file and rename
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| RepoError::filesystem(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RepoError::filesystem(dir, e))?;
    tmp.write_all(data).map_err(|e| RepoError::filesystem(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| RepoError::filesystem(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| RepoError::filesystem(path, e.error))?;
    Ok(())
}
