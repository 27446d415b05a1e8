//! Error types for repository operations

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::refresh::RefreshFailure;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Lock Errors ============
    #[error("Timed out after {:?} waiting for lock {}", .timeout, .path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("Filesystem error at {}: {}", .path.display(), .source)]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ============ Configuration Errors ============
    #[error("Repository not found: {name}")]
    RepositoryNotFound { name: String },

    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid repository name '{name}': {reason}")]
    InvalidRepositoryName { name: String, reason: String },

    #[error("No repositories configured")]
    NoRepositoriesConfigured,

    // ============ Network Errors ============
    #[error("Repository {name} ({url}) is unreachable: {reason}")]
    UnreachableRepository {
        name: String,
        url: String,
        reason: String,
    },

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {:?}", .timeout)]
    Timeout { timeout: Duration },

    // ============ Index Errors ============
    #[error("Failed to refresh repository indexes: {}", summarize(.failures))]
    IndexRefreshFailed { failures: Vec<RefreshFailure> },

    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    #[error("No cached index for repository {name}; run 'chartform repo update'")]
    IndexNotCached { name: String },

    // ============ Chart Errors ============
    #[error("Chart not found: {name} in repository {repo}")]
    ChartNotFound { name: String, repo: String },

    #[error("Version not found: {name}@{version} in repository {repo}")]
    VersionNotFound {
        name: String,
        version: String,
        repo: String,
    },

    #[error("Version constraint unsatisfiable: {name} requires {constraint}, available: {available}")]
    UnsatisfiableConstraint {
        name: String,
        constraint: String,
        available: String,
    },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Dependency {name} has no usable repository: {reason}")]
    UnresolvableDependency { name: String, reason: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] chartform_core::CoreError),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

fn summarize(failures: &[RefreshFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.name, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RepoError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RepoError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::NetworkError {
                message: format!("Request timed out: {}", e),
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRepositoryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

impl From<semver::Error> for RepoError {
    fn from(e: semver::Error) -> Self {
        RepoError::UnsatisfiableConstraint {
            name: String::new(),
            constraint: String::new(),
            available: format!("invalid semver: {}", e),
        }
    }
}
